//! verifa-extractors - Text recovery for verifa documents.
//!
//! Provides the OCR engine adapters (local tesseract, cloud document OCR,
//! vision-model generative OCR), PDF text-layer and page-image readers, and
//! the [`ExtractionOrchestrator`] that chains them with quality gating.
//!
//! # Features
//!
//! - `pdf` (default) - PDF text layer via pdf-extract, page images via lopdf
//! - `image` (default) - Image decoding and re-encoding of raw page images
//! - `ocr` - Local OCR via tesseract (requires tesseract installed)
//! - `vision` - Generative OCR via a vision model (async-openai)
//! - `full` - All extraction features
//!
//! # Example
//!
//! ```ignore
//! use verifa_extractors::{EngineFactory, ExtractionOrchestrator};
//!
//! let engines = EngineFactory::from_config(&config.ocr, &config.llm)?;
//! let orchestrator = ExtractionOrchestrator::new(config.extraction.clone(), engines)
//!     .with_caller(caller.clone());
//! let ocr = orchestrator.extract(&raw_document).await;
//! ```

mod cloud;
mod error;
mod factory;
mod orchestrator;
mod types;

pub mod image;

#[cfg(feature = "pdf")]
mod pdf;

#[cfg(feature = "ocr")]
mod tesseract;

#[cfg(feature = "vision")]
pub mod vision;

pub use cloud::CloudDocumentOcr;
pub use error::{ExtractError, ExtractResult};
pub use factory::{EngineFactory, EngineSet};
pub use orchestrator::ExtractionOrchestrator;
pub use types::{PageImage, Recognition};

#[cfg(feature = "pdf")]
pub use pdf::PdfReader;

#[cfg(feature = "ocr")]
pub use tesseract::TesseractEngine;

#[cfg(feature = "vision")]
pub use vision::{VisionConfig, VisionOcrEngine};

use async_trait::async_trait;
use verifa_core::types::EngineKind;

/// Core OCR engine trait - every text-recognition tier implements this.
///
/// Engines do not retry and do not time out on their own; the orchestrator
/// applies both around each call.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text on one page image.
    async fn recognize(&self, content: &[u8], mime_type: &str) -> ExtractResult<Recognition>;

    /// Tier this engine belongs to.
    fn kind(&self) -> EngineKind;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Access to the two things the orchestrator needs from a PDF.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Native text layer, one entry per page.
    async fn text_layer(&self, content: &[u8]) -> ExtractResult<Vec<String>>;

    /// One image per page, in page order.
    async fn page_images(&self, content: &[u8]) -> ExtractResult<Vec<PageImage>>;
}
