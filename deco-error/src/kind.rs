//! Error kinds for LLM-DECO operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on `ErrorKind` to decide what to do: a `ConstraintViolated`
/// command is discarded, a `RateLimited` inference is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration file or values
    ConfigInvalid,

    // =========================================================================
    // Network / node errors
    // =========================================================================
    /// No node with the given id exists in the network
    NodeNotFound,

    /// Unknown node policy name
    InvalidPolicy,

    // =========================================================================
    // Command errors
    // =========================================================================
    /// Command is structurally invalid (missing target, empty reasoning, ...)
    InvalidCommand,

    /// Command is well-formed but breaks a mission constraint
    ConstraintViolated,

    // =========================================================================
    // Storage errors
    // =========================================================================
    /// Serialization/deserialization failed
    SerializationFailed,

    /// Journal or other storage operation failed
    StorageFailed,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// Provider not available or not authorised
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,

    /// Invalid argument passed to function
    InvalidArgument,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            ErrorKind::NodeNotFound => "NodeNotFound",
            ErrorKind::InvalidPolicy => "InvalidPolicy",

            ErrorKind::InvalidCommand => "InvalidCommand",
            ErrorKind::ConstraintViolated => "ConstraintViolated",

            ErrorKind::SerializationFailed => "SerializationFailed",
            ErrorKind::StorageFailed => "StorageFailed",

            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",

            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::InvalidArgument => "InvalidArgument",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::NodeNotFound.to_string(), "NodeNotFound");
        assert_eq!(ErrorKind::ConstraintViolated.to_string(), "ConstraintViolated");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::InvalidCommand.is_retryable());
        assert!(!ErrorKind::ParseFailed.is_retryable());
    }
}
