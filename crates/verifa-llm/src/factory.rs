//! Factory for creating LLM providers.

use std::sync::Arc;

use verifa_core::config::{LlmProvider, LlmProviderConfig};
use verifa_core::error::VerifyResult;
use verifa_core::traits::{Llm, LlmConfig};

use crate::anthropic::AnthropicLlm;
use crate::gemini::GeminiLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> VerifyResult<Arc<dyn Llm>> {
        tracing::debug!(?provider, model = %config.model, "creating llm provider");
        match provider {
            LlmProvider::OpenAI => Ok(Arc::new(OpenAIProvider::new(config)?)),
            LlmProvider::Anthropic => Ok(Arc::new(AnthropicLlm::new(config)?)),
            LlmProvider::Gemini => Ok(Arc::new(GeminiLlm::new(config)?)),
        }
    }

    /// Create the provider described by a configuration section.
    pub fn from_config(config: &LlmProviderConfig) -> VerifyResult<Arc<dyn Llm>> {
        Self::create(config.provider, config.config.clone())
    }

    /// Create an OpenAI LLM provider with default configuration.
    pub fn openai() -> VerifyResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, LlmConfig::default())
    }

    /// Create an OpenAI LLM provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> VerifyResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, Self::with_model(model))
    }

    /// Create an Anthropic LLM provider with a specific model.
    pub fn anthropic_with_model(model: impl Into<String>) -> VerifyResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::Anthropic, Self::with_model(model))
    }

    /// Create a Gemini LLM provider with a specific model.
    pub fn gemini_with_model(model: impl Into<String>) -> VerifyResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::Gemini, Self::with_model(model))
    }

    fn with_model(model: impl Into<String>) -> LlmConfig {
        LlmConfig {
            model: model.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_from_config_builds_each_provider() {
        for (provider, default_model) in [
            (LlmProvider::OpenAI, "gpt-4o-mini"),
            (LlmProvider::Anthropic, "claude-3-5-haiku-20241022"),
            (LlmProvider::Gemini, "gemini-2.0-flash"),
        ] {
            let config = LlmProviderConfig {
                provider,
                config: LlmConfig {
                    api_key: Some(SecretString::new("key".to_string())),
                    ..Default::default()
                },
            };
            let llm = LlmFactory::from_config(&config).unwrap();
            assert_eq!(llm.model_name(), default_model);
        }
    }
}
