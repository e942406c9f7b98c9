//! Anthropic Claude provider implementation

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(120)))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1")
    }

    fn build_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let model = request.model.as_deref().unwrap_or(self.default_model());

        // The Messages API takes the system prompt out of band
        let mut system: Option<String> = None;
        let mut messages = Vec::new();
        for msg in &request.messages {
            if msg.role == Role::System {
                system = Some(match system.take() {
                    Some(prev) => format!("{}\n\n{}", prev, msg.content),
                    None => msg.content.clone(),
                });
            } else {
                messages.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                });
            }
        }

        AnthropicRequest {
            model: model.to_string(),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(1024),
            temperature: request.temperature,
            stop_sequences: request.stop.clone(),
        }
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".into(),
            "claude-opus-4-20250514".into(),
            "claude-3-5-sonnet-20241022".into(),
            "claude-3-5-haiku-20241022".into(),
        ]
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-sonnet-4-20250514")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let api_request = self.build_request(&request);

        let api_key = self.config.api_key.as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        let mut req = self.client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", api_key)
            .header("content-type", "application/json")
            .json(&api_request);

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        if !self.config.headers.contains_key("anthropic-version") {
            req = req.header("anthropic-version", "2023-06-01");
        }

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let content: String = api_response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        let finish_reason = match api_response.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Unknown,
        };

        let usage = Usage {
            prompt_tokens: api_response.usage.input_tokens,
            completion_tokens: api_response.usage.output_tokens,
            total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
        };

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            content: if content.is_empty() { None } else { Some(content) },
            finish_reason,
            usage,
        })
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_split_out() {
        let provider = AnthropicProvider::new(ProviderConfig::anthropic("sk-ant")).unwrap();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("schema"),
            ChatMessage::user("state"),
            ChatMessage::assistant("{bad"),
            ChatMessage::user("try again"),
        ]);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["system"], "schema");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_response_parsing_skips_non_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "{\"action\": \"DO_NOTHING\"}"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 20, "output_tokens": 5}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed.content[0], ContentBlock::Other));
        assert!(matches!(parsed.content[1], ContentBlock::Text { .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_failure() {
        let mut config = ProviderConfig::anthropic("unused");
        config.api_key = None;
        let provider = AnthropicProvider::new(config).unwrap();

        let err = provider.prompt("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }
}
