//! verifa-core - Core library for verifa.
//!
//! This crate provides the data model, the resilient call layer, field
//! extraction, fuzzy matching, cross-document validation and verdict
//! aggregation for the verifa document verification pipeline.
//!
//! # Example
//!
//! ```ignore
//! use verifa_core::{aggregate, CrossDocumentValidator, FieldExtractor, SiblingDocuments};
//!
//! let extraction = extractor.extract(DocumentType::Identity, &ocr).await;
//! let result = validator
//!     .validate(DocumentType::Identity, &ocr, extraction, &SiblingDocuments::new())
//!     .await;
//! let verdict = aggregate(&result);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod fields;
pub mod json_parser;
pub mod matching;
pub mod prompts;
pub mod registry;
pub mod resilience;
pub mod traits;
pub mod types;
pub mod validation;
pub mod verdict;

// Re-export commonly used types
pub use config::{
    DispatchConfig, ExtractionConfig, FieldConfig, InputConfig, LlmProvider, LlmProviderConfig,
    MatchingConfig, OcrConfig, Requirements, RetryConfig, VerifaConfig,
};
pub use error::{ErrorCode, VerifyError, VerifyResult};
pub use events::{EventBus, NoopObserver, Observer, PipelineEvent, SharedObserver, TracingObserver};
pub use fields::{FieldExtraction, FieldExtractor, Strategy};
pub use matching::{similarity, CompatibilityTier};
pub use registry::{InMemoryRegistry, SqliteRegistry};
pub use resilience::{DispatchQueue, ResilientCaller};
pub use traits::{AcademicRegistry, GenerationOptions, IdentityRegistry, Llm, LlmConfig, LlmResponse};
pub use types::{
    AcademicRecord, CheckCategory, CheckSource, CheckStatus, DocumentType,
    DocumentValidationResult, EducationLevel, EngineKind, ExtractedField, ExtractionResult,
    FieldName, FieldSet, FieldSource, FieldValue, IdentityRecord, Message, RawDocument,
    ValidationCheck, Verdict, VerdictStatus,
};
pub use validation::{CrossDocumentValidator, MajorJudge, SiblingDocuments, ValidatedDocument};
pub use verdict::aggregate;
