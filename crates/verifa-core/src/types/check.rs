//! Validation checks and per-document validation results.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use super::{DocumentType, FieldSet};

/// Category a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Extraction,
    Completeness,
    Registry,
    Identity,
    Age,
    Location,
    EducationLevel,
    Major,
    Gpa,
    Consistency,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

/// Data source a check relied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckSource {
    Ocr,
    Registry,
    CrossDocument,
    Matcher,
    Ai,
    Rule,
}

/// One evaluated rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub label: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_value: Option<String>,
    /// Similarity score in `[0, 100]` when a matcher was involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<u8>,
    pub source: CheckSource,
}

impl ValidationCheck {
    /// Create a check with no values attached.
    pub fn new(
        category: CheckCategory,
        status: CheckStatus,
        label: impl Into<String>,
        detail: impl Into<String>,
        source: CheckSource,
    ) -> Self {
        Self {
            category,
            status,
            label: label.into(),
            detail: detail.into(),
            extracted_value: None,
            required_value: None,
            similarity: None,
            source,
        }
    }

    /// Builder: attach the extracted value.
    pub fn with_extracted(mut self, value: impl Into<String>) -> Self {
        self.extracted_value = Some(value.into());
        self
    }

    /// Builder: attach the required value.
    pub fn with_required(mut self, value: impl Into<String>) -> Self {
        self.required_value = Some(value.into());
        self
    }

    /// Builder: attach a similarity score.
    pub fn with_similarity(mut self, similarity: u8) -> Self {
        self.similarity = Some(similarity.min(100));
        self
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentValidationResult {
    pub document_type: DocumentType,
    /// True iff `errors` is empty.
    pub success: bool,
    pub checks: Vec<ValidationCheck>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub extracted_data: FieldSet,
    /// Number of passed checks.
    pub score: u32,
}

impl DocumentValidationResult {
    /// Checks with the given status.
    pub fn checks_with(&self, status: CheckStatus) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(move |c| c.status == status)
    }

    /// First check of a category, if any.
    pub fn check(&self, category: CheckCategory) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.category == category)
    }
}
