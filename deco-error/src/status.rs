//! Error status - how callers should react to an error

use std::fmt;

/// Retry classification carried by every [`crate::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// Retrying will not help
    Permanent,
    /// May succeed if retried (rate limits, flaky network)
    Temporary,
    /// Was temporary, but retries have been exhausted
    Persistent,
}

impl ErrorStatus {
    /// Whether the caller may retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Mark a temporary failure as persistent after retries ran out.
    pub fn persist(self) -> Self {
        match self {
            ErrorStatus::Temporary => ErrorStatus::Persistent,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
            ErrorStatus::Persistent => "persistent",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_only_affects_temporary() {
        assert_eq!(ErrorStatus::Temporary.persist(), ErrorStatus::Persistent);
        assert_eq!(ErrorStatus::Permanent.persist(), ErrorStatus::Permanent);
        assert_eq!(ErrorStatus::Persistent.persist(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorStatus::Temporary.to_string(), "temporary");
        assert!(!ErrorStatus::Persistent.is_retryable());
    }
}
