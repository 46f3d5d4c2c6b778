//! Extraction error types.

use thiserror::Error;
use verifa_core::error::{ErrorCode, VerifyError};

/// Errors that can occur while recovering text from a document.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Content type is not supported by the engine.
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    /// PDF could not be parsed or had no usable content.
    #[error("PDF extraction error: {0}")]
    Pdf(String),

    /// Image bytes could not be decoded.
    #[error("Image error: {0}")]
    Image(String),

    /// An OCR engine failed.
    #[error("{engine} failed: {message}")]
    Ocr { engine: &'static str, message: String },

    /// The vision model call failed.
    #[error("Vision extraction error: {0}")]
    Vision(String),

    /// The engine did not answer within its time budget.
    #[error("{engine} timed out after {secs}s")]
    Timeout { engine: &'static str, secs: u64 },

    /// The service signalled a rate limit.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The service reported it is overloaded.
    #[error("Service overloaded: {0}")]
    Overloaded(String),

    /// Missing credentials or endpoint.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Extracted content is empty.
    #[error("Empty content extracted")]
    EmptyContent,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error during extraction.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task join error from spawn_blocking.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

impl ExtractError {
    /// Classify an HTTP error status returned by an OCR service.
    pub(crate) fn from_status(engine: &'static str, status: u16, message: String) -> Self {
        match status {
            429 => Self::RateLimited(format!("{}: {}", engine, message)),
            503 | 529 => Self::Overloaded(format!("{}: {}", engine, message)),
            401 | 403 => Self::Configuration(format!("{} rejected credentials: {}", engine, message)),
            _ => Self::Ocr {
                engine,
                message: format!("HTTP {}: {}", status, message),
            },
        }
    }
}

impl From<ExtractError> for VerifyError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::RateLimited(message) => VerifyError::rate_limit(message),
            ExtractError::Overloaded(message) => VerifyError::overloaded(message),
            ExtractError::Configuration(message) => VerifyError::Configuration(message),
            ExtractError::Timeout { .. } => VerifyError::Timeout {
                message: err.to_string(),
                code: ErrorCode::OcrTimeout,
            },
            ExtractError::UnsupportedType(mime) => VerifyError::validation_with_suggestion(
                format!("unsupported MIME type: {}", mime),
                ErrorCode::ValUnsupportedMime,
                "Submit a PDF or a PNG, JPEG, GIF or WebP image",
            ),
            other => VerifyError::Ocr {
                message: other.to_string(),
                code: ErrorCode::OcrEngineFailed,
                source: Some(Box::new(other)),
            },
        }
    }
}
