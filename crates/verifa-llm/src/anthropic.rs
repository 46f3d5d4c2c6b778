//! Anthropic (Claude) LLM provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use verifa_core::error::{VerifyError, VerifyResult};
use verifa_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage};
use verifa_core::types::{Message, MessageRole};

use crate::http::{api_key, read_body, transport_error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Appended to the system prompt when JSON output is requested, since the
/// Messages API has no native JSON mode.
const JSON_INSTRUCTION: &str = "Respond with a single JSON object and nothing else.";

/// Anthropic LLM provider.
pub struct AnthropicLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicLlm {
    /// Create a new Anthropic LLM provider.
    pub fn new(config: LlmConfig) -> VerifyResult<Self> {
        let api_key = api_key(&config, "ANTHROPIC_API_KEY", "Anthropic")?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            api_key
                .parse()
                .map_err(|_| VerifyError::Configuration("Invalid API key format".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| VerifyError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn build_request(&self, messages: &[Message], options: &GenerationOptions) -> AnthropicRequest {
        let mut system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if options.response_format == Some(ResponseFormat::Json) {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(JSON_INSTRUCTION);
        }

        let conversation = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            system: (!system.is_empty()).then_some(system),
            messages: conversation,
        }
    }
}

#[async_trait]
impl Llm for AnthropicLlm {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> VerifyResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let request = self.build_request(messages, &options);
        tracing::debug!(model = %request.model, "anthropic request");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;
        let body = read_body("Anthropic", response).await?;

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| VerifyError::llm(format!("Failed to parse Anthropic response: {}", e)))?;

        let content = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(LlmResponse {
            content: (!content.is_empty()).then_some(content),
            model: response.model.unwrap_or(request.model),
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicLlm {
        AnthropicLlm::new(LlmConfig {
            api_key: Some(secrecy::SecretString::new("test-key".to_string())),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_model() {
        assert_eq!(provider().model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_request_splits_system_and_applies_override() {
        let llm = provider();
        let messages = vec![
            Message::system("Extract fields."),
            Message::user("NIK: 3201234567890123"),
        ];
        let options = GenerationOptions::json_for("claude-fallback", 0.0);

        let request = llm.build_request(&messages, &options);

        assert_eq!(request.model, "claude-fallback");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        let system = request.system.unwrap();
        assert!(system.starts_with("Extract fields."));
        assert!(system.ends_with(JSON_INSTRUCTION));
        assert_eq!(request.temperature, Some(0.0));
    }
}
