//! Field extraction from raw document text.
//!
//! Strategies run in a per-document-type order: labeled patterns,
//! structural patterns, the same patterns over OCR-noise-normalized text,
//! then a schema-directed generative call. Fields nothing finds are gaps.

mod ai;
mod extractor;
pub mod identity_number;
pub mod normalize;
mod patterns;

pub use extractor::{
    fields_for, FieldExtraction, FieldExtractor, Strategy, AI_FIRST_STRATEGIES,
    DEFAULT_STRATEGIES,
};
pub use normalize::{normalize_code, parse_date, parse_gpa};
