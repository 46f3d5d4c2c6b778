//! OpenAI LLM provider implementation.

use async_trait::async_trait;

use verifa_core::error::{VerifyError, VerifyResult};
use verifa_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse};
use verifa_core::types::Message;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};
#[cfg(feature = "openai")]
use verifa_core::traits::{ResponseFormat, TokenUsage};
#[cfg(feature = "openai")]
use verifa_core::types::MessageRole;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> VerifyResult<Self> {
        let api_key = crate::http::api_key(&config, "OPENAI_API_KEY", "OpenAI")?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(ref base_url) = config.base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(model: &str) -> bool {
        let model = model.to_lowercase();
        ["o1", "o3", "o4", "gpt-5"]
            .iter()
            .any(|m| model.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        Ok(match msg.role {
            MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
        })
    }

    #[cfg(feature = "openai")]
    fn build_request(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> VerifyResult<CreateChatCompletionRequest> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let reasoning = Self::is_reasoning_model(&model);

        let messages = messages
            .iter()
            .map(Self::message_to_openai)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_openai_error)?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(model)
            .messages(messages)
            .max_completion_tokens(options.max_tokens.unwrap_or(self.config.max_tokens));
        if !reasoning {
            request.temperature(options.temperature.unwrap_or(self.config.temperature));
        }
        if options.response_format == Some(ResponseFormat::Json) {
            request.response_format(OpenAIResponseFormat::JsonObject);
        }

        request.build().map_err(map_openai_error)
    }
}

/// Map an async-openai error onto the shared error taxonomy.
#[cfg(feature = "openai")]
fn map_openai_error(err: OpenAIError) -> VerifyError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api
                .code
                .clone()
                .or_else(|| api.r#type.clone())
                .unwrap_or_default();
            let message = format!("OpenAI: {}", api.message);
            match kind.as_str() {
                "rate_limit_exceeded" | "rate_limit_error" => VerifyError::rate_limit(message),
                "server_error" | "overloaded" | "overloaded_error" | "service_unavailable" => {
                    VerifyError::overloaded(message)
                }
                "invalid_api_key" | "invalid_request_error" if api.message.contains("API key") => {
                    VerifyError::Configuration(message)
                }
                "insufficient_quota" => VerifyError::Configuration(message),
                _ => VerifyError::llm(message),
            }
        }
        OpenAIError::Reqwest(e) if e.is_timeout() => {
            VerifyError::timeout(format!("OpenAI request timed out: {}", e))
        }
        OpenAIError::Reqwest(e) => VerifyError::api(format!("OpenAI request failed: {}", e)),
        OpenAIError::JSONDeserialize(e) => {
            VerifyError::parse(format!("Failed to parse OpenAI response: {}", e))
        }
        other => VerifyError::llm(format!("OpenAI error: {}", other)),
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> VerifyResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let request = self.build_request(messages, &options)?;
        tracing::debug!(model = %request.model, "openai request");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.is_empty());

        Ok(LlmResponse {
            content,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> VerifyResult<LlmResponse> {
        Err(VerifyError::Configuration(
            "OpenAI feature not enabled".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAIProvider {
        OpenAIProvider::new(LlmConfig {
            model: model.to_string(),
            api_key: Some(secrecy::SecretString::new("sk-test".to_string())),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_model() {
        assert_eq!(provider("").model_name(), DEFAULT_MODEL);
        assert_eq!(provider("gpt-4o").model_name(), "gpt-4o");
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(OpenAIProvider::is_reasoning_model("o3-mini"));
        assert!(OpenAIProvider::is_reasoning_model("gpt-5-nano"));
        assert!(!OpenAIProvider::is_reasoning_model("gpt-4o-mini"));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_request_uses_override_and_json_mode() {
        let llm = provider("gpt-4o-mini");
        let messages = vec![Message::system("Extract fields."), Message::user("NIK: 3201234567890123")];

        let request = llm
            .build_request(&messages, &GenerationOptions::json_for("gpt-4o", 0.0))
            .unwrap();

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.0));
        assert!(matches!(request.response_format, Some(OpenAIResponseFormat::JsonObject)));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_api_error_mapping() {
        let api = |code: &str, message: &str| {
            OpenAIError::ApiError(async_openai::error::ApiError {
                message: message.to_string(),
                r#type: None,
                param: None,
                code: Some(code.to_string()),
            })
        };

        assert!(map_openai_error(api("rate_limit_exceeded", "slow down")).is_retryable());
        assert!(map_openai_error(api("server_error", "busy")).is_retryable());
        assert!(map_openai_error(api("invalid_api_key", "Incorrect API key provided")).is_configuration());
        assert!(!map_openai_error(api("model_not_found", "no such model")).is_retryable());
    }
}
