//! Cloud document OCR over the `images:annotate` REST API.
//!
//! Uses `DOCUMENT_TEXT_DETECTION`, which handles dense and handwritten text
//! better than local OCR.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use verifa_core::types::EngineKind;

use crate::error::{ExtractError, ExtractResult};
use crate::types::Recognition;
use crate::OcrEngine;

const ENGINE: &str = "cloud-ocr";

/// Cloud document OCR engine.
pub struct CloudDocumentOcr {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    language_hints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<AnnotatedPage>,
}

#[derive(Debug, Deserialize)]
struct AnnotatedPage {
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl CloudDocumentOcr {
    /// Create a new cloud OCR engine.
    pub fn new(endpoint: impl Into<String>, api_key: SecretString) -> ExtractResult<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ExtractError::Configuration(
                "Cloud OCR API key is empty. Set VERIFA_CLOUD_OCR_KEY or ocr.cloud_api_key."
                    .to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ExtractError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            language_hints: vec!["id".to_string(), "en".to_string()],
        })
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }

    fn request_body(&self, content: &[u8]) -> serde_json::Value {
        json!({
            "requests": [{
                "image": { "content": STANDARD.encode(content) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": self.language_hints },
            }]
        })
    }
}

fn parse_response(body: &str) -> ExtractResult<Recognition> {
    let response: AnnotateResponse = serde_json::from_str(body).map_err(|e| ExtractError::Ocr {
        engine: ENGINE,
        message: format!("Failed to parse response: {}", e),
    })?;
    let first = response.responses.into_iter().next().ok_or(ExtractError::EmptyContent)?;

    if let Some(status) = first.error {
        // google.rpc.Code: 8 RESOURCE_EXHAUSTED, 14 UNAVAILABLE
        return Err(match status.code {
            8 => ExtractError::RateLimited(format!("{}: {}", ENGINE, status.message)),
            14 => ExtractError::Overloaded(format!("{}: {}", ENGINE, status.message)),
            _ => ExtractError::Ocr {
                engine: ENGINE,
                message: status.message,
            },
        });
    }

    let annotation = first.full_text_annotation.ok_or(ExtractError::EmptyContent)?;
    let reported: Vec<f32> = annotation.pages.iter().filter_map(|p| p.confidence).collect();
    let confidence =
        (!reported.is_empty()).then(|| reported.iter().sum::<f32>() / reported.len() as f32);

    Ok(Recognition::new(annotation.text, confidence))
}

#[async_trait]
impl OcrEngine for CloudDocumentOcr {
    async fn recognize(&self, content: &[u8], mime_type: &str) -> ExtractResult<Recognition> {
        if !crate::image::is_image_mime(mime_type) {
            return Err(ExtractError::UnsupportedType(mime_type.to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret().as_str())
            .json(&self.request_body(content))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout {
                        engine: ENGINE,
                        secs: 60,
                    }
                } else {
                    ExtractError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExtractError::from_status(ENGINE, status.as_u16(), body));
        }

        parse_response(&body)
    }

    fn kind(&self) -> EngineKind {
        EngineKind::CloudOcr
    }

    fn name(&self) -> &str {
        ENGINE
    }
}
