//! Generative OCR through a vision model (async-openai).
//!
//! The last-resort tier: the page image is sent with a schema-directed
//! prompt and the model answers with a JSON transcript and its own
//! confidence.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest, ImageDetail,
        ImageUrl, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use verifa_core::json_parser::parse_json_object;
use verifa_core::types::EngineKind;

use crate::error::{ExtractError, ExtractResult};
use crate::types::Recognition;
use crate::OcrEngine;

const ENGINE: &str = "vision-ocr";

const TRANSCRIBE_PROMPT: &str = "You are a document transcription engine for Indonesian \
administrative documents (identity cards, diplomas, transcripts, letters). Transcribe every \
piece of text visible in the image exactly as written, preserving line breaks, numbers and \
punctuation. Do not translate, summarize or correct anything. Respond with a JSON object of \
the form {\"text\": string, \"confidence\": number between 0 and 1}, where confidence is your \
estimate that the transcript is accurate.";

/// Configuration for vision-model OCR.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Model to use (default: gpt-4o-mini).
    pub model: String,
    /// Max tokens for response (default: 2000).
    pub max_tokens: u32,
    /// Image detail level (default: High).
    pub detail: ImageDetail,
    /// Responses shorter than this are rejected as empty.
    pub min_response_length: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            detail: ImageDetail::High,
            min_response_length: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Transcript {
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Vision-model OCR engine.
pub struct VisionOcrEngine {
    client: Client<OpenAIConfig>,
    config: VisionConfig,
}

impl VisionOcrEngine {
    /// Create a new engine. The key falls back to `OPENAI_API_KEY`.
    pub fn new(
        config: VisionConfig,
        api_key: Option<SecretString>,
        base_url: Option<String>,
    ) -> ExtractResult<Self> {
        let api_key = api_key
            .map(|k| k.expose_secret().clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ExtractError::Configuration(
                    "Vision OCR API key not found. Set OPENAI_API_KEY or provide llm.api_key."
                        .to_string(),
                )
            })?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            config,
        })
    }

    fn build_request(&self, content: &[u8], mime_type: &str) -> CreateChatCompletionRequest {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(content));

        let image_part = ChatCompletionRequestMessageContentPartImage {
            image_url: ImageUrl {
                url: data_url,
                detail: Some(self.config.detail.clone()),
            },
        };

        CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Array(vec![
                        ChatCompletionRequestUserMessageContentPart::Text(
                            TRANSCRIBE_PROMPT.to_string().into(),
                        ),
                        ChatCompletionRequestUserMessageContentPart::ImageUrl(image_part),
                    ]),
                    name: None,
                },
            )],
            max_completion_tokens: Some(self.config.max_tokens),
            temperature: Some(0.0),
            response_format: Some(ResponseFormat::JsonObject),
            ..Default::default()
        }
    }
}

fn map_openai_error(err: OpenAIError) -> ExtractError {
    match err {
        OpenAIError::ApiError(api) => match api.code.as_deref().or(api.r#type.as_deref()) {
            Some("rate_limit_exceeded") => ExtractError::RateLimited(api.message),
            Some("server_error") | Some("overloaded") => ExtractError::Overloaded(api.message),
            Some("invalid_api_key") => ExtractError::Configuration(api.message),
            _ => ExtractError::Vision(api.message),
        },
        other => ExtractError::Vision(other.to_string()),
    }
}

fn parse_transcript(content: &str, min_length: usize) -> ExtractResult<Recognition> {
    let transcript: Transcript = parse_json_object(content, min_length)
        .map_err(|e| ExtractError::Vision(format!("Malformed transcript: {}", e)))?;
    if transcript.text.trim().is_empty() {
        return Err(ExtractError::EmptyContent);
    }
    Ok(Recognition::new(transcript.text, transcript.confidence))
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    async fn recognize(&self, content: &[u8], mime_type: &str) -> ExtractResult<Recognition> {
        if !crate::image::is_image_mime(mime_type) {
            return Err(ExtractError::UnsupportedType(mime_type.to_string()));
        }

        let response = self
            .client
            .chat()
            .create(self.build_request(content, mime_type))
            .await
            .map_err(map_openai_error)?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(ExtractError::EmptyContent)?;

        parse_transcript(&text, self.config.min_response_length)
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Generative
    }

    fn name(&self) -> &str {
        ENGINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> VisionOcrEngine {
        VisionOcrEngine::new(
            VisionConfig::default(),
            Some(SecretString::new("sk-test".to_string())),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_request_is_schema_directed() {
        let request = engine().build_request(b"img", "image/png");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, Some(0.0));
        assert!(matches!(request.response_format, Some(ResponseFormat::JsonObject)));
    }

    #[test]
    fn test_parse_fenced_transcript() {
        let content = "Here you go:\n```json\n{\"text\": \"IJAZAH\\nNomor: 001/S1/2019\", \"confidence\": 0.85}\n```";
        let r = parse_transcript(content, 10).unwrap();
        assert_eq!(r.text, "IJAZAH\nNomor: 001/S1/2019");
        assert_eq!(r.confidence, Some(0.85));
    }

    #[test]
    fn test_parse_rejects_short_and_empty() {
        assert!(matches!(parse_transcript("{}", 10), Err(ExtractError::Vision(_))));
        assert!(matches!(
            parse_transcript(r#"{"text": "   ", "confidence": 0.9}"#, 10),
            Err(ExtractError::EmptyContent)
        ));
    }
}
