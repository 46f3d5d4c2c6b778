//! Cross-document validator: runs the ordered check list for one document.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::judge::MajorJudge;
use super::ledger::CheckLedger;
use super::siblings::SiblingDocuments;
use crate::config::{MatchingConfig, Requirements};
use crate::events::{NoopObserver, SharedObserver};
use crate::fields::FieldExtraction;
use crate::matching::{best_match, similarity};
use crate::traits::{AcademicRegistry, IdentityRegistry};
use crate::types::{
    CheckCategory, CheckSource, CheckStatus, DocumentType, DocumentValidationResult,
    ExtractionResult, FieldName, FieldSet, FieldSource, ValidationCheck,
};

/// Below this OCR confidence the extraction check is a warning.
const LOW_OCR_CONFIDENCE: f32 = 0.5;

/// Outcome of resolving a key against a registry.
pub(crate) enum Resolution<R> {
    Exact(R),
    /// Reconciled through an OCR-tolerant match with the given similarity.
    Fuzzy(R, u8),
    NotFound,
    Unavailable(String),
}

/// Validates documents against policy, registries and sibling documents.
///
/// Checks run in a fixed order per document type, so the same input always
/// yields the same check list.
pub struct CrossDocumentValidator {
    pub(crate) requirements: Requirements,
    pub(crate) matching: MatchingConfig,
    pub(crate) identities: Arc<dyn IdentityRegistry>,
    pub(crate) academics: Arc<dyn AcademicRegistry>,
    pub(crate) judge: MajorJudge,
    observer: SharedObserver,
}

impl CrossDocumentValidator {
    pub fn new(
        requirements: Requirements,
        matching: MatchingConfig,
        identities: Arc<dyn IdentityRegistry>,
        academics: Arc<dyn AcademicRegistry>,
    ) -> Self {
        Self {
            judge: MajorJudge::new(matching.clone()),
            requirements,
            matching,
            identities,
            academics,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the major judge (e.g. one with a generative backend).
    pub fn with_judge(mut self, judge: MajorJudge) -> Self {
        self.judge = judge;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Bind the major judge's generative calls to `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.judge = self.judge.with_cancellation(token);
        self
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Validate one document.
    ///
    /// External failures are absorbed into warnings; this never fails.
    pub async fn validate(
        &self,
        doc_type: DocumentType,
        ocr: &ExtractionResult,
        extraction: FieldExtraction,
        siblings: &SiblingDocuments,
    ) -> DocumentValidationResult {
        let mut ledger = CheckLedger::new(doc_type, self.observer.clone());
        let FieldExtraction { mut fields, gaps } = extraction;

        ledger.record(extraction_check(doc_type, ocr));

        match doc_type {
            DocumentType::Identity => {
                self.validate_identity(&mut ledger, &mut fields, &gaps)
                    .await
            }
            DocumentType::Diploma => {
                self.validate_diploma(&mut ledger, &mut fields, &gaps, siblings)
                    .await
            }
            DocumentType::Transcript => {
                self.validate_transcript(&mut ledger, &fields, &gaps, siblings)
            }
            DocumentType::ApplicationLetter | DocumentType::StatementLetter => {
                self.validate_letter(doc_type, &mut ledger, &ocr.text, &fields, siblings)
            }
        }

        tracing::debug!(
            document = %doc_type,
            checks = ledger.len(),
            failed = ledger.has_errors(),
            "validation finished"
        );
        ledger.finish(fields)
    }

    /// Bounded candidate prefix for fuzzy registry fallback.
    pub(crate) fn candidate_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.char_indices()
            .nth(self.matching.candidate_prefix_len)
            .map_or(key, |(i, _)| &key[..i])
    }

    pub(crate) fn resolve_best<R>(
        &self,
        key: &str,
        candidates: Vec<R>,
        key_of: impl Fn(&R) -> &str,
    ) -> Resolution<R> {
        match best_match(key, candidates, key_of, self.matching.fuzzy_floor) {
            Some((record, score)) => Resolution::Fuzzy(record, score),
            None => Resolution::NotFound,
        }
    }

    /// A name asserted on this document must appear on the identity card.
    pub(crate) fn name_consistency_check(
        &self,
        doc_type: DocumentType,
        name: Option<String>,
        siblings: &SiblingDocuments,
    ) -> ValidationCheck {
        let label = "Name matches identity card";
        let Some(identity) = siblings.get(DocumentType::Identity) else {
            return ValidationCheck::new(
                CheckCategory::Consistency,
                CheckStatus::Warning,
                label,
                format!(
                    "No validated identity card to cross-check the name on the {}",
                    doc_type.label()
                ),
                CheckSource::CrossDocument,
            );
        };
        let Some(name) = name else {
            return ValidationCheck::new(
                CheckCategory::Consistency,
                CheckStatus::Warning,
                label,
                format!("Name not found on the {}", doc_type.label()),
                CheckSource::CrossDocument,
            );
        };

        let check = if identity.mentions(&name) {
            ValidationCheck::new(
                CheckCategory::Consistency,
                CheckStatus::Passed,
                label,
                format!(
                    "Name '{}' on the {} appears on the {}",
                    name,
                    doc_type.label(),
                    identity.document_type.label()
                ),
                CheckSource::CrossDocument,
            )
        } else {
            ValidationCheck::new(
                CheckCategory::Consistency,
                CheckStatus::Failed,
                label,
                format!(
                    "Name '{}' on the {} does not appear on the {}",
                    name,
                    doc_type.label(),
                    identity.document_type.label()
                ),
                CheckSource::CrossDocument,
            )
        };
        check.with_extracted(name)
    }

    /// Minimum GPA threshold.
    pub(crate) fn gpa_check(&self, fields: &FieldSet) -> ValidationCheck {
        let min = self.requirements.min_gpa;
        let Some(gpa) = fields.number(FieldName::Gpa) else {
            return ValidationCheck::new(
                CheckCategory::Gpa,
                CheckStatus::Warning,
                "Minimum GPA",
                "GPA not found",
                CheckSource::Ocr,
            )
            .with_required(format!("{:.2}", min));
        };

        let status = if gpa + f64::EPSILON >= min {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        let detail = match status {
            CheckStatus::Passed => format!("GPA {:.2} meets the minimum {:.2}", gpa, min),
            _ => format!("GPA {:.2} is below the minimum {:.2}", gpa, min),
        };
        ValidationCheck::new(
            CheckCategory::Gpa,
            status,
            "Minimum GPA",
            detail,
            source_of(fields, FieldName::Gpa),
        )
        .with_extracted(format!("{:.2}", gpa))
        .with_required(format!("{:.2}", min))
    }
}

/// Whether the document yielded usable text.
fn extraction_check(doc_type: DocumentType, ocr: &ExtractionResult) -> ValidationCheck {
    let label = "Text extraction";
    let check = if ocr.is_empty() {
        ValidationCheck::new(
            CheckCategory::Extraction,
            CheckStatus::Warning,
            label,
            format!(
                "No text could be extracted from the {}; checks ran on insufficient data",
                doc_type.label()
            ),
            CheckSource::Ocr,
        )
    } else if ocr.confidence < LOW_OCR_CONFIDENCE {
        ValidationCheck::new(
            CheckCategory::Extraction,
            CheckStatus::Warning,
            label,
            format!(
                "Low OCR confidence ({:.2}) on the {}",
                ocr.confidence,
                doc_type.label()
            ),
            CheckSource::Ocr,
        )
    } else {
        ValidationCheck::new(
            CheckCategory::Extraction,
            CheckStatus::Passed,
            label,
            format!(
                "Text extracted by {} with confidence {:.2}",
                ocr.engine, ocr.confidence
            ),
            CheckSource::Ocr,
        )
    };
    check.with_extracted(ocr.engine.to_string())
}

/// Fields a document type cannot be judged without.
pub(crate) fn essential_fields(doc_type: DocumentType) -> &'static [FieldName] {
    match doc_type {
        DocumentType::Identity => &[
            FieldName::IdentityNumber,
            FieldName::FullName,
            FieldName::BirthDate,
        ],
        DocumentType::Diploma => &[
            FieldName::DiplomaNumber,
            FieldName::FullName,
            FieldName::Institution,
            FieldName::Major,
        ],
        DocumentType::Transcript => &[FieldName::FullName, FieldName::Gpa],
        DocumentType::ApplicationLetter | DocumentType::StatementLetter => &[],
    }
}

/// Fields still missing after registry data was merged in.
///
/// Essential fields are always listed. Other fields are listed when field
/// extraction reported them as gaps and no registry record filled them.
pub(crate) fn completeness_check(
    doc_type: DocumentType,
    fields: &FieldSet,
    gaps: &[FieldName],
) -> ValidationCheck {
    let essential = essential_fields(doc_type);
    let missing: Vec<&str> = essential
        .iter()
        .filter(|f| !fields.contains(**f))
        .map(|f| f.label())
        .collect();
    let unfilled: Vec<&str> = gaps
        .iter()
        .filter(|f| !essential.contains(f) && !fields.contains(**f))
        .map(|f| f.label())
        .collect();

    if missing.is_empty() && unfilled.is_empty() {
        return ValidationCheck::new(
            CheckCategory::Completeness,
            CheckStatus::Passed,
            "Required fields",
            format!("All required {} fields present", doc_type.label()),
            CheckSource::Rule,
        );
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!(
            "Missing {} fields: {}",
            doc_type.label(),
            missing.join(", ")
        ));
    }
    if !unfilled.is_empty() {
        parts.push(format!("not found on the document: {}", unfilled.join(", ")));
    }
    let mut detail = parts.join("; ");
    if missing.is_empty() {
        detail = format!("{} fields {}", doc_type.label(), detail);
    }
    ValidationCheck::new(
        CheckCategory::Completeness,
        CheckStatus::Warning,
        "Required fields",
        detail,
        CheckSource::Rule,
    )
}

/// Check source matching the provenance of a field.
pub(crate) fn source_of(fields: &FieldSet, name: FieldName) -> CheckSource {
    match fields.get(name).map(|f| f.source) {
        Some(FieldSource::ReferenceLookup) => CheckSource::Registry,
        Some(FieldSource::Ai) => CheckSource::Ai,
        _ => CheckSource::Ocr,
    }
}

/// Completed years between `birth` and `today`.
pub(crate) fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Similarity of two optional strings, 0 when either is missing.
pub(crate) fn similarity_of(a: Option<&str>, b: Option<&str>) -> u8 {
    match (a, b) {
        (Some(a), Some(b)) => similarity(a, b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExtractedField, FieldValue};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        assert_eq!(age_on(date(1995, 5, 15), date(2026, 5, 14)), 30);
        assert_eq!(age_on(date(1995, 5, 15), date(2026, 5, 15)), 31);
        assert_eq!(age_on(date(2000, 2, 29), date(2026, 2, 28)), 25);
    }

    #[test]
    fn test_extraction_check_levels() {
        let empty = extraction_check(DocumentType::Identity, &ExtractionResult::failed(1));
        assert_eq!(empty.status, CheckStatus::Warning);
        assert!(empty.detail.contains("insufficient data"));

        let low = extraction_check(
            DocumentType::Identity,
            &ExtractionResult::new("NIK 1", 0.3, crate::types::EngineKind::LocalOcr, 1),
        );
        assert_eq!(low.status, CheckStatus::Warning);

        let good = extraction_check(
            DocumentType::Identity,
            &ExtractionResult::new("NIK 1", 0.9, crate::types::EngineKind::PdfText, 1),
        );
        assert_eq!(good.status, CheckStatus::Passed);
        assert_eq!(good.extracted_value.as_deref(), Some("pdf_text"));
    }

    #[test]
    fn test_completeness_lists_missing_fields() {
        let check = completeness_check(DocumentType::Transcript, &FieldSet::new(), &[]);
        assert_eq!(check.status, CheckStatus::Warning);
        assert!(check.detail.contains("full name"));
        assert!(check.detail.contains("GPA"));
    }

    #[test]
    fn test_completeness_reports_unfilled_gaps() {
        let mut fields = FieldSet::new();
        for name in essential_fields(DocumentType::Identity) {
            fields.insert(
                *name,
                ExtractedField::text(*name, "x", 0.9, FieldSource::Pattern),
            );
        }
        // Province was filled from the registry; city was not.
        fields.insert(
            FieldName::Province,
            ExtractedField::reference(FieldName::Province, FieldValue::Text("JAWA BARAT".into())),
        );

        let check = completeness_check(
            DocumentType::Identity,
            &fields,
            &[FieldName::Province, FieldName::City],
        );
        assert_eq!(check.status, CheckStatus::Warning);
        assert!(check.detail.contains(FieldName::City.label()));
        assert!(!check.detail.contains(FieldName::Province.label()));
        assert!(!check.detail.contains("Missing"));

        let none = completeness_check(DocumentType::Identity, &fields, &[FieldName::Province]);
        assert_eq!(none.status, CheckStatus::Passed);
    }
}
