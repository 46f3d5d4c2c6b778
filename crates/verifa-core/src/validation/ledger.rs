//! Append-only check list for one document validation pass.

use crate::events::{PipelineEvent, SharedObserver};
use crate::types::{CheckStatus, DocumentType, DocumentValidationResult, FieldSet, ValidationCheck};

/// Accumulates checks in evaluation order.
///
/// A passed check raises the score, a warning is recorded as a warning and
/// a failed check is recorded as an error. Only errors make the result
/// unsuccessful.
pub struct CheckLedger {
    document_type: DocumentType,
    checks: Vec<ValidationCheck>,
    errors: Vec<String>,
    warnings: Vec<String>,
    score: u32,
    observer: SharedObserver,
}

impl CheckLedger {
    pub fn new(document_type: DocumentType, observer: SharedObserver) -> Self {
        Self {
            document_type,
            checks: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            score: 0,
            observer,
        }
    }

    /// Append a check.
    pub fn record(&mut self, check: ValidationCheck) {
        match check.status {
            CheckStatus::Passed => self.score += 1,
            CheckStatus::Warning => self.warnings.push(check.detail.clone()),
            CheckStatus::Failed => self.errors.push(check.detail.clone()),
        }
        self.observer.on_event(&PipelineEvent::check_evaluated(
            self.document_type,
            check.category,
            check.status,
            check.label.clone(),
        ));
        self.checks.push(check);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Close the ledger into a validation result.
    pub fn finish(self, extracted_data: FieldSet) -> DocumentValidationResult {
        DocumentValidationResult {
            document_type: self.document_type,
            success: self.errors.is_empty(),
            checks: self.checks,
            errors: self.errors,
            warnings: self.warnings,
            extracted_data,
            score: self.score,
        }
    }
}
