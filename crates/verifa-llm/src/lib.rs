//! verifa-llm - Generative model providers for verifa.
//!
//! Every provider implements [`verifa_core::traits::Llm`] and maps provider
//! failures onto [`verifa_core::VerifyError`] so the resilient call layer can
//! tell rate limits and overloads (retried) from everything else.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`, default) - GPT-4o, GPT-4.1, etc.
//! - **Anthropic** - Claude models over the Messages API
//! - **Gemini** - Google Gemini over `generateContent`
//!
//! # Example
//!
//! ```ignore
//! use verifa_llm::LlmFactory;
//!
//! let llm = LlmFactory::openai_with_model("gpt-4o-mini")?;
//! let llm = LlmFactory::from_config(&config.llm)?;
//! ```

mod anthropic;
mod factory;
mod gemini;
mod http;
mod openai;

pub use anthropic::AnthropicLlm;
pub use factory::LlmFactory;
pub use gemini::GeminiLlm;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use verifa_core::config::LlmProvider;
pub use verifa_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
