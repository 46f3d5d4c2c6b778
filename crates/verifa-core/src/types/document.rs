//! Raw input documents and extraction results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Kind of document submitted for verification.
///
/// The declaration order is also the order in which a bundle is verified,
/// so later documents can be cross-checked against earlier ones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// National identity card.
    Identity,
    /// Diploma / degree certificate.
    Diploma,
    /// Academic transcript.
    Transcript,
    /// Application letter written by the applicant.
    ApplicationLetter,
    /// Signed statement letter.
    StatementLetter,
}

impl DocumentType {
    /// Human-readable label used in check details and reasons.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Identity => "identity card",
            Self::Diploma => "diploma",
            Self::Transcript => "transcript",
            Self::ApplicationLetter => "application letter",
            Self::StatementLetter => "statement letter",
        }
    }
}

/// Immutable input document, owned by the caller.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Declared document type.
    pub doc_type: DocumentType,
    /// File content.
    pub bytes: Vec<u8>,
    /// MIME type reported by the ingestion layer.
    pub mime_type: String,
}

impl RawDocument {
    /// Create a new raw document.
    pub fn new(doc_type: DocumentType, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            doc_type,
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// SHA-256 hex digest of the content, used in logs instead of the bytes.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(digest)
    }

    /// Whether the content is a page-description format.
    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// Content size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the document has no content.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Engine that produced an extraction result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Native text layer of a digital PDF.
    PdfText,
    /// Local/offline OCR.
    LocalOcr,
    /// Cloud document OCR.
    CloudOcr,
    /// Cloud generative (schema-directed) extraction.
    Generative,
    /// Pages were produced by different engines.
    Mixed,
    /// No engine produced usable text.
    None,
}

/// Text recovered from one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted text (page-delimited for multi-page input).
    pub text: String,
    /// Weakest meaningful confidence signal, in `[0, 1]`.
    pub confidence: f32,
    /// Producing engine.
    pub engine: EngineKind,
    /// Number of pages seen.
    pub page_count: usize,
}

impl ExtractionResult {
    /// Create a new extraction result, clamping confidence into `[0, 1]`.
    pub fn new(text: impl Into<String>, confidence: f32, engine: EngineKind, page_count: usize) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            engine,
            page_count,
        }
    }

    /// Result returned when every extraction tier failed.
    pub fn failed(page_count: usize) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            engine: EngineKind::None,
            page_count,
        }
    }

    /// Check if extraction produced meaningful content.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
