//! OpenAI-compatible provider implementation
//!
//! Works with OpenAI, Azure OpenAI, vLLM, Ollama, and other OpenAI-compatible APIs.

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(120)))
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.openai.com/v1")
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAIRequest {
        let model = request.model.as_deref().unwrap_or(self.default_model());

        OpenAIRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then(|| serde_json::json!({ "type": "json_object" })),
            stop: request.stop.clone(),
        }
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "gpt-4o".into(),
            "gpt-4o-mini".into(),
            "gpt-4-turbo".into(),
            "o1".into(),
            "o1-mini".into(),
        ]
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gpt-4o")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let api_request = self.build_request(&request);

        let mut req = self.client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(&api_request);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let api_response: OpenAIResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = api_response.choices.first()
            .ok_or_else(|| ProviderError::Other("No choices in response".into()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }).unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            content: choice.message.content.clone(),
            finish_reason,
            usage,
        })
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<&ChatMessage> for OpenAIMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    id: String,
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_defaults() {
        let provider = OpenAIProvider::new(ProviderConfig::openai("sk-test")).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "gpt-4o");
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let provider =
            OpenAIProvider::new(ProviderConfig::local("http://localhost:11434/v1", "llama3"))
                .unwrap();
        let request = CompletionRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("state"),
        ])
        .with_json_mode(true);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 12);
    }
}
