//! Error types for verifa operations.
//!
//! This module provides the error hierarchy shared by every crate in the
//! workspace, with structured error codes, suggestions for resolution and
//! the retry classification used by the resilient call layer.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for verifa operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Main error type for all verifa operations.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Input rejected before entering the pipeline.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Rate limit signalled by an external service.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// External service reported it is overloaded.
    #[error("Service overloaded: {message}")]
    Overloaded { message: String, code: ErrorCode },

    /// Generative model call failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// OCR engine failed.
    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Reference registry lookup failed.
    #[error("Registry error: {message}")]
    Registry {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (missing credentials, bad config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation exceeded its deadline.
    #[error("Timed out: {message}")]
    Timeout { message: String, code: ErrorCode },

    /// Operation dropped because the request was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Unparseable or incomplete external response.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValUnsupportedMime,
    ValTooLarge,

    // Rate Limit (RATE_xxx)
    RateLimitExceeded,
    RateOverloaded,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmEmptyResponse,

    // OCR (OCR_xxx)
    OcrEngineFailed,
    OcrTimeout,

    // Registry (REG_xxx)
    RegLookupFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValUnsupportedMime => "VAL_002",
            ErrorCode::ValTooLarge => "VAL_003",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::RateOverloaded => "RATE_002",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmEmptyResponse => "LLM_003",
            ErrorCode::OcrEngineFailed => "OCR_001",
            ErrorCode::OcrTimeout => "OCR_002",
            ErrorCode::RegLookupFailed => "REG_001",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl VerifyError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with a specific code and suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        code: ErrorCode,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an OCR error.
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr {
            message: message.into(),
            code: ErrorCode::OcrEngineFailed,
            source: None,
        }
    }

    /// Create a registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
            code: ErrorCode::RegLookupFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Create an overload error.
    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::Overloaded {
            message: message.into(),
            code: ErrorCode::RateOverloaded,
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            code: ErrorCode::NetTimeout,
        }
    }

    /// Whether the resilient call layer may retry after this error.
    ///
    /// Only explicit rate-limit and overload signals qualify; everything
    /// else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Overloaded { .. })
    }

    /// Whether this error stems from request cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is a fatal configuration failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedProvider { .. }
        )
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::Overloaded { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Ocr { code, .. } => *code,
            Self::Registry { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Timeout { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::Overloaded { .. } => Some("The provider is overloaded, try a fallback model"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            Self::Ocr { .. } => Some("Please check the OCR engine installation and credentials"),
            Self::Registry { .. } => Some("Please check the registry connection settings"),
            Self::Configuration(_) => Some("Please check credentials and configuration files"),
            _ => None,
        }
    }

    /// Convert from an HTTP status code returned by an external service.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValInvalidInput,
                details: HashMap::new(),
                suggestion: Some("Please check your request parameters".to_string()),
            },
            401 | 403 => Self::Configuration(format!("credentials rejected ({}): {}", status, body)),
            408 | 504 => Self::Timeout {
                message: body.to_string(),
                code: ErrorCode::NetTimeout,
            },
            429 => Self::RateLimit {
                message: body.to_string(),
                code: ErrorCode::RateLimitExceeded,
                retry_after: None,
            },
            503 | 529 => Self::Overloaded {
                message: body.to_string(),
                code: ErrorCode::RateOverloaded,
            },
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<rusqlite::Error> for VerifyError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Registry {
            message: err.to_string(),
            code: ErrorCode::RegLookupFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = VerifyError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_retry_classification() {
        assert!(VerifyError::rate_limit("slow down").is_retryable());
        assert!(VerifyError::overloaded("busy").is_retryable());
        assert!(!VerifyError::llm("bad request").is_retryable());
        assert!(!VerifyError::parse("not json").is_retryable());
        assert!(!VerifyError::Configuration("no key".into()).is_retryable());
        assert!(!VerifyError::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_http_status() {
        assert!(VerifyError::from_http_status(429, "too many").is_retryable());
        assert!(VerifyError::from_http_status(529, "overloaded").is_retryable());
        assert!(VerifyError::from_http_status(401, "nope").is_configuration());
        assert!(!VerifyError::from_http_status(500, "boom").is_retryable());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::RateLimitExceeded.as_str(), "RATE_001");
        assert_eq!(ErrorCode::ParseInvalidJson.as_str(), "PARSE_001");
    }
}
