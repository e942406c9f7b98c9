//! # LLM Provider Interface
//!
//! A trait-based abstraction for communicating with LLM backends.
//!
//! ## Design
//! - `LlmProvider` trait defines the core interface
//! - Implementations for OpenAI-compatible endpoints and Anthropic
//! - Usage tracking across planning cycles
//!
//! Commands are one small JSON object, so there is no streaming path.

pub mod openai;
pub mod anthropic;

pub use openai::OpenAIProvider;
pub use anthropic::AnthropicProvider;

use deco_error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Ask the backend to constrain output to a JSON object, where supported
    pub json_mode: bool,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Authentication failed or no API key configured
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        let base = match &err {
            ProviderError::Network(_) => Error::new(ErrorKind::NetworkFailed, message),
            ProviderError::RateLimited { retry_after } => {
                let e = Error::new(ErrorKind::RateLimited, message);
                match retry_after {
                    Some(secs) => e.with_context("retry_after", secs.to_string()),
                    None => e,
                }
            }
            ProviderError::AuthenticationFailed => {
                Error::new(ErrorKind::ProviderUnavailable, message).permanent()
            }
            ProviderError::Parse(_) => Error::new(ErrorKind::ParseFailed, message),
            ProviderError::Api { status, .. } if *status >= 500 => {
                Error::new(ErrorKind::InferenceFailed, message)
                    .temporary()
                    .with_context("status", status.to_string())
            }
            ProviderError::Api { status, .. } => Error::new(ErrorKind::InvalidArgument, message)
                .with_context("status", status.to_string()),
            ProviderError::Other(_) => Error::new(ErrorKind::InferenceFailed, message),
        };
        base.with_operation("provider::complete").set_source(err)
    }
}

/// The main LLM provider trait
#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Get known models
    fn models(&self) -> Vec<String>;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Simple prompt -> response helper
    async fn prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);
        let response = self.complete(request).await?;
        response.content.ok_or_else(|| ProviderError::Other("No content in response".into()))
    }

    /// Chat with message history
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(messages);
        let response = self.complete(request).await?;
        response.content.ok_or_else(|| ProviderError::Other("No content in response".into()))
    }
}

/// Map an HTTP error status to a provider error.
pub(crate) fn status_error(status: u16, text: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after: None },
        401 | 403 => ProviderError::AuthenticationFailed,
        _ => ProviderError::Api { status, message: text },
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    Local,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("anthropic-version".into(), "2023-06-01".into());

        Self {
            provider_type: ProviderType::Anthropic,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.anthropic.com/v1".into()),
            default_model: Some("claude-sonnet-4-20250514".into()),
            headers,
            timeout_secs: Some(120),
        }
    }

    /// A local OpenAI-compatible server (vLLM, Ollama, llama.cpp)
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are the orchestrator");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are the orchestrator");

        assert_eq!(ChatMessage::user("state").role, Role::User);
        assert_eq!(ChatMessage::assistant("{}").role, Role::Assistant);
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![ChatMessage::user("Hello")])
            .with_model("gpt-4o")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_json_mode(true);

        assert_eq!(request.model, Some("gpt-4o".into()));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert!(request.json_mode);
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::openai("sk-test");
        assert_eq!(config.provider_type, ProviderType::OpenAI);
        assert_eq!(config.default_model, Some("gpt-4o".into()));

        let config = ProviderConfig::anthropic("sk-ant-test").with_timeout(30);
        assert_eq!(config.provider_type, ProviderType::Anthropic);
        assert!(config.headers.contains_key("anthropic-version"));
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_provider_error_mapping() {
        let err: Error = ProviderError::RateLimited { retry_after: Some(3) }.into();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
        assert_eq!(err.context_value("retry_after"), Some("3"));

        let err: Error = ProviderError::AuthenticationFailed.into();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert!(!err.is_retryable());

        let err: Error = ProviderError::Api { status: 503, message: "busy".into() }.into();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert!(err.is_retryable());

        let err: Error = ProviderError::Api { status: 400, message: "bad".into() }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_error() {
        assert!(matches!(status_error(429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(status_error(401, String::new()), ProviderError::AuthenticationFailed));
        assert!(matches!(status_error(500, "x".into()), ProviderError::Api { status: 500, .. }));
    }

    #[test]
    fn test_usage_tracker() {
        let mut tracker = UsageTracker::new();

        tracker.track("gpt-4o", &Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        });

        tracker.track("gpt-4o", &Usage {
            prompt_tokens: 200,
            completion_tokens: 100,
            total_tokens: 300,
        });

        assert_eq!(tracker.total_calls, 2);
        assert_eq!(tracker.total_prompt_tokens, 300);
        assert_eq!(tracker.total_completion_tokens, 150);
        assert_eq!(tracker.total_tokens(), 450);
        assert_eq!(tracker.by_model["gpt-4o"].total_tokens, 450);
    }
}
