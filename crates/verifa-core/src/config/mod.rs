//! Configuration system for verifa.

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorCode, VerifyError, VerifyResult};
use crate::traits::LlmConfig;
use crate::types::{DocumentType, EducationLevel, RawDocument};

/// Retry policy for calls through the resilient call layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries per target.
    pub max_retries: u32,
    /// Delay before the first retry (milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay (milliseconds).
    pub max_delay_ms: u64,
    /// Targets tried, in order, after the primary target is exhausted.
    pub fallback_targets: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            fallback_targets: Vec::new(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Builder: set fallback targets.
    pub fn with_fallbacks(mut self, targets: Vec<String>) -> Self {
        self.fallback_targets = targets;
        self
    }
}

/// Global dispatch limits for external calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of calls in flight.
    pub max_concurrency: usize,
    /// Minimum spacing between two dispatches (milliseconds).
    pub min_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            min_interval_ms: 250,
        }
    }
}

/// Extraction orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Text-layer length a PDF must exceed to skip OCR.
    pub pdf_min_text_length: usize,
    /// Markers that flag a text layer as a failed extraction.
    pub failure_sentinels: Vec<String>,
    /// Hard timeout around local OCR (seconds).
    pub local_ocr_timeout_secs: u64,
    /// Page text shorter than this is handed to the next OCR tier.
    pub min_ocr_text_length: usize,
    /// Document types whose key fields are usually handwritten.
    pub handwritten_types: Vec<DocumentType>,
    /// Page delimiter template; `{n}` is replaced by the page number.
    pub page_delimiter: String,
    /// Overall extraction deadline per document (seconds).
    pub deadline_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_min_text_length: 50,
            failure_sentinels: vec![
                "[extraction failed]".to_string(),
                "[no text layer]".to_string(),
            ],
            local_ocr_timeout_secs: 10,
            min_ocr_text_length: 20,
            handwritten_types: vec![DocumentType::StatementLetter],
            page_delimiter: "--- Page {n} ---".to_string(),
            deadline_secs: 120,
        }
    }
}

impl ExtractionConfig {
    pub fn local_ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.local_ocr_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Whether the document type relies on handwritten fields.
    pub fn is_handwritten(&self, doc_type: DocumentType) -> bool {
        self.handwritten_types.contains(&doc_type)
    }

    /// Render the delimiter for a 1-based page number.
    pub fn delimiter_for(&self, page: usize) -> String {
        self.page_delimiter.replace("{n}", &page.to_string())
    }
}

/// Field extractor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Whether the generative strategy may be used at all.
    pub ai_enabled: bool,
    /// Generative calls attempted while responses stay malformed.
    pub ai_attempts: u32,
    /// Document types that try the generative strategy before patterns.
    pub ai_first_types: Vec<DocumentType>,
    /// Responses shorter than this are rejected as empty.
    pub min_ai_response_length: usize,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            ai_attempts: 3,
            ai_first_types: Vec::new(),
            min_ai_response_length: 10,
        }
    }
}

/// Fuzzy matching thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity to treat two noisy identifiers as equal.
    pub fuzzy_floor: u8,
    /// Maximum candidates fetched for fuzzy registry fallback.
    pub candidate_limit: usize,
    /// Key prefix length used to bound the candidate search.
    pub candidate_prefix_len: usize,
    /// Major compatibility score at or above which the check passes.
    pub major_pass: u8,
    /// Major compatibility score at or above which the check needs review.
    pub major_review: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_floor: 80,
            candidate_limit: 50,
            candidate_prefix_len: 6,
            major_pass: 75,
            major_review: 50,
        }
    }
}

/// Policy requirements checked by the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    pub min_age: u32,
    pub max_age: u32,
    pub min_gpa: f64,
    /// Accepted majors; empty disables the major check.
    pub required_majors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_education_level: Option<EducationLevel>,
    /// Province the applicant should be registered in (advisory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formation_province: Option<String>,
    /// Position name the letters should mention (advisory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formation_name: Option<String>,
    pub application_keywords: Vec<String>,
    pub statement_keywords: Vec<String>,
    pub min_letter_length: usize,
    /// Allowed difference between transcript GPA and registry GPA.
    pub gpa_tolerance: f64,
    /// Date ages are computed against; today when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            min_age: 18,
            max_age: 35,
            min_gpa: 3.0,
            required_majors: Vec::new(),
            required_education_level: Some(EducationLevel::S1),
            formation_province: None,
            formation_name: None,
            application_keywords: vec!["lamaran".to_string()],
            statement_keywords: vec!["pernyataan".to_string(), "meterai".to_string()],
            min_letter_length: 100,
            gpa_tolerance: 0.05,
            reference_date: None,
        }
    }
}

impl Requirements {
    /// Date used for age computation.
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Generative provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
    Gemini,
}

/// Provider configuration with type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider type.
    pub provider: LlmProvider,
    /// Provider-specific configuration.
    #[serde(flatten)]
    pub config: LlmConfig,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.1,
                ..Default::default()
            },
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enable_local: bool,
    pub enable_cloud: bool,
    pub enable_generative: bool,
    /// Tesseract language string.
    pub tesseract_language: String,
    /// Cloud document OCR endpoint.
    pub cloud_endpoint: String,
    /// Cloud document OCR API key.
    #[serde(default, skip_serializing)]
    pub cloud_api_key: Option<SecretString>,
    /// Vision model used for generative OCR.
    pub vision_model: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enable_local: true,
            enable_cloud: false,
            enable_generative: false,
            tesseract_language: "ind+eng".to_string(),
            cloud_endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            cloud_api_key: None,
            vision_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Input acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_size_bytes: usize,
    pub accepted_mime_types: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 5 * 1024 * 1024,
            accepted_mime_types: [
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "application/pdf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl InputConfig {
    /// Re-validate a document before it is dispatched.
    pub fn check(&self, doc: &RawDocument) -> VerifyResult<()> {
        if doc.is_empty() {
            return Err(VerifyError::validation("document is empty"));
        }
        if !self.accepted_mime_types.iter().any(|m| m == &doc.mime_type) {
            return Err(VerifyError::validation_with_suggestion(
                format!("unsupported MIME type: {}", doc.mime_type),
                ErrorCode::ValUnsupportedMime,
                format!("Accepted types: {}", self.accepted_mime_types.join(", ")),
            ));
        }
        if doc.len() > self.max_size_bytes {
            return Err(VerifyError::validation_with_suggestion(
                format!(
                    "document is {} bytes, limit is {} bytes",
                    doc.len(),
                    self.max_size_bytes
                ),
                ErrorCode::ValTooLarge,
                "Compress or rescan the document at a lower resolution",
            ));
        }
        Ok(())
    }
}

/// Main verifa configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifaConfig {
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,
    pub extraction: ExtractionConfig,
    pub fields: FieldConfig,
    pub matching: MatchingConfig,
    pub requirements: Requirements,
    pub llm: LlmProviderConfig,
    pub ocr: OcrConfig,
    pub input: InputConfig,
}

impl VerifaConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| VerifyError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| VerifyError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| VerifyError::Configuration(e.to_string())),
            _ => Err(VerifyError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override values from environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(provider) = std::env::var("VERIFA_LLM_PROVIDER") {
            self.llm.provider = match provider.to_lowercase().as_str() {
                "anthropic" => LlmProvider::Anthropic,
                "gemini" => LlmProvider::Gemini,
                _ => LlmProvider::OpenAI,
            };
        }
        if let Ok(model) = std::env::var("VERIFA_LLM_MODEL") {
            self.llm.config.model = model;
        }
        if let Ok(models) = std::env::var("VERIFA_LLM_FALLBACK_MODELS") {
            self.retry.fallback_targets = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }

        let key_var = match self.llm.provider {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
        };
        if let Ok(api_key) = std::env::var(key_var) {
            self.llm.config.api_key = Some(SecretString::new(api_key));
        }

        if let Ok(key) = std::env::var("VERIFA_CLOUD_OCR_KEY") {
            self.ocr.cloud_api_key = Some(SecretString::new(key));
            self.ocr.enable_cloud = true;
        }
        if let Ok(lang) = std::env::var("VERIFA_TESSERACT_LANG") {
            self.ocr.tesseract_language = lang;
        }
        if std::env::var("VERIFA_DISABLE_AI").is_ok() {
            self.fields.ai_enabled = false;
            self.ocr.enable_generative = false;
        }

        if let Ok(n) = std::env::var("VERIFA_MAX_CONCURRENCY") {
            if let Ok(n) = n.parse() {
                self.dispatch.max_concurrency = n;
            }
        }
        if let Ok(ms) = std::env::var("VERIFA_MIN_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.dispatch.min_interval_ms = ms;
            }
        }
        if let Ok(n) = std::env::var("VERIFA_MAX_RETRIES") {
            if let Ok(n) = n.parse() {
                self.retry.max_retries = n;
            }
        }
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> VerifaConfigBuilder {
        VerifaConfigBuilder::default()
    }
}

/// Builder for VerifaConfig.
#[derive(Default)]
pub struct VerifaConfigBuilder {
    config: VerifaConfig,
}

impl VerifaConfigBuilder {
    /// Set retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set dispatch limits.
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    /// Set extraction settings.
    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.config.extraction = extraction;
        self
    }

    /// Set field extractor settings.
    pub fn fields(mut self, fields: FieldConfig) -> Self {
        self.config.fields = fields;
        self
    }

    /// Set matching thresholds.
    pub fn matching(mut self, matching: MatchingConfig) -> Self {
        self.config.matching = matching;
        self
    }

    /// Set policy requirements.
    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.config.requirements = requirements;
        self
    }

    /// Set LLM configuration.
    pub fn llm(mut self, llm: LlmProviderConfig) -> Self {
        self.config.llm = llm;
        self
    }

    /// Set OCR configuration.
    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> VerifaConfig {
        self.config
    }
}
