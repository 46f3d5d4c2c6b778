//! Factory for creating OCR engines.

use std::sync::Arc;

use verifa_core::config::{LlmProviderConfig, OcrConfig};

use crate::cloud::CloudDocumentOcr;
use crate::error::{ExtractError, ExtractResult};
use crate::OcrEngine;

#[cfg(feature = "ocr")]
use crate::tesseract::TesseractEngine;

#[cfg(feature = "vision")]
use crate::vision::{VisionConfig, VisionOcrEngine};

/// The engines available to one orchestrator, one slot per tier.
#[derive(Clone, Default)]
pub struct EngineSet {
    pub local: Option<Arc<dyn OcrEngine>>,
    pub cloud: Option<Arc<dyn OcrEngine>>,
    pub generative: Option<Arc<dyn OcrEngine>>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.local = Some(engine);
        self
    }

    pub fn with_cloud(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.cloud = Some(engine);
        self
    }

    pub fn with_generative(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.generative = Some(engine);
        self
    }

    /// Engines in the order they are tried. Handwritten documents go to
    /// cloud OCR before local OCR; generative extraction is always last.
    pub fn chain(&self, handwritten: bool) -> Vec<Arc<dyn OcrEngine>> {
        let (first, second) = if handwritten {
            (&self.cloud, &self.local)
        } else {
            (&self.local, &self.cloud)
        };
        [first, second, &self.generative]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_none() && self.cloud.is_none() && self.generative.is_none()
    }

    /// Names of the configured engines, for logs.
    pub fn names(&self) -> Vec<String> {
        [&self.local, &self.cloud, &self.generative]
            .into_iter()
            .flatten()
            .map(|e| e.name().to_string())
            .collect()
    }
}

impl std::fmt::Debug for EngineSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSet")
            .field("engines", &self.names())
            .finish()
    }
}

/// Factory for creating OCR engines.
pub struct EngineFactory;

impl EngineFactory {
    /// Build the engines enabled in `ocr`. The generative tier reuses the
    /// LLM credentials when the configured provider is OpenAI.
    pub fn from_config(ocr: &OcrConfig, llm: &LlmProviderConfig) -> ExtractResult<EngineSet> {
        let mut engines = EngineSet::new();

        if ocr.enable_local {
            engines.local = Self::local(&ocr.tesseract_language);
        }

        if ocr.enable_cloud {
            let key = ocr.cloud_api_key.clone().ok_or_else(|| {
                ExtractError::Configuration(
                    "Cloud OCR is enabled but no API key is set (VERIFA_CLOUD_OCR_KEY)".to_string(),
                )
            })?;
            engines.cloud = Some(Arc::new(CloudDocumentOcr::new(&ocr.cloud_endpoint, key)?));
        }

        if ocr.enable_generative {
            engines.generative = Self::generative(ocr, llm)?;
        }

        tracing::debug!(engines = ?engines.names(), "ocr engines configured");
        Ok(engines)
    }

    #[cfg(feature = "ocr")]
    fn local(language: &str) -> Option<Arc<dyn OcrEngine>> {
        Some(Arc::new(TesseractEngine::new(language)))
    }

    #[cfg(not(feature = "ocr"))]
    fn local(_language: &str) -> Option<Arc<dyn OcrEngine>> {
        tracing::warn!("local OCR is enabled but verifa-extractors was built without the `ocr` feature");
        None
    }

    #[cfg(feature = "vision")]
    fn generative(ocr: &OcrConfig, llm: &LlmProviderConfig) -> ExtractResult<Option<Arc<dyn OcrEngine>>> {
        let (api_key, base_url) = match llm.provider {
            verifa_core::config::LlmProvider::OpenAI => (llm.config.api_key.clone(), llm.config.base_url.clone()),
            _ => (None, None),
        };
        let config = VisionConfig {
            model: ocr.vision_model.clone(),
            ..Default::default()
        };
        Ok(Some(Arc::new(VisionOcrEngine::new(config, api_key, base_url)?)))
    }

    #[cfg(not(feature = "vision"))]
    fn generative(_ocr: &OcrConfig, _llm: &LlmProviderConfig) -> ExtractResult<Option<Arc<dyn OcrEngine>>> {
        tracing::warn!("generative OCR is enabled but verifa-extractors was built without the `vision` feature");
        Ok(None)
    }
}
