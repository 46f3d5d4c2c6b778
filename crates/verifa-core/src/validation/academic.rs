//! Diploma and transcript rules.

use super::ledger::CheckLedger;
use super::siblings::SiblingDocuments;
use super::validator::{completeness_check, source_of, CrossDocumentValidator, Resolution};
use crate::matching::CompatibilityTier;
use crate::types::{
    AcademicRecord, CheckCategory, CheckSource, CheckStatus, DocumentType, EducationLevel,
    ExtractedField, FieldName, FieldSet, FieldValue, ValidationCheck,
};

impl CrossDocumentValidator {
    /// Registry, completeness, identity link, name, level, major and GPA.
    pub(crate) async fn validate_diploma(
        &self,
        ledger: &mut CheckLedger,
        fields: &mut FieldSet,
        gaps: &[FieldName],
        siblings: &SiblingDocuments,
    ) {
        let record = self.academic_registry_check(ledger, fields).await;
        ledger.record(completeness_check(DocumentType::Diploma, fields, gaps));

        if let Some(check) = identity_link_check(record.as_ref(), siblings) {
            ledger.record(check);
        }
        ledger.record(self.name_consistency_check(
            DocumentType::Diploma,
            fields.text(FieldName::FullName),
            siblings,
        ));

        if let Some(required) = self.requirements.required_education_level {
            ledger.record(education_level_check(required, fields));
        }
        if !self.requirements.required_majors.is_empty() {
            ledger.record(self.major_check(fields).await);
        }
        // Most diplomas do not print a GPA; only judge one that is known.
        if fields.contains(FieldName::Gpa) {
            ledger.record(self.gpa_check(fields));
        }
    }

    /// Completeness, GPA threshold, GPA consistency and name.
    pub(crate) fn validate_transcript(
        &self,
        ledger: &mut CheckLedger,
        fields: &FieldSet,
        gaps: &[FieldName],
        siblings: &SiblingDocuments,
    ) {
        ledger.record(completeness_check(DocumentType::Transcript, fields, gaps));
        ledger.record(self.gpa_check(fields));

        let diploma_gpa = siblings
            .get(DocumentType::Diploma)
            .and_then(|d| d.fields.number(FieldName::Gpa));
        if let (Some(transcript), Some(recorded)) = (fields.number(FieldName::Gpa), diploma_gpa) {
            ledger.record(self.gpa_consistency_check(transcript, recorded));
        }

        ledger.record(self.name_consistency_check(
            DocumentType::Transcript,
            fields.text(FieldName::FullName),
            siblings,
        ));
    }

    pub(crate) async fn resolve_academic(&self, number: &str) -> Resolution<AcademicRecord> {
        match self.academics.find_academic(number).await {
            Ok(Some(record)) => Resolution::Exact(record),
            Ok(None) => {
                let prefix = self.candidate_prefix(number);
                match self
                    .academics
                    .academic_candidates(prefix, self.matching.candidate_limit)
                    .await
                {
                    Ok(candidates) => {
                        self.resolve_best(number, candidates, |r| r.diploma_number.as_str())
                    }
                    Err(e) => Resolution::Unavailable(e.to_string()),
                }
            }
            Err(e) => Resolution::Unavailable(e.to_string()),
        }
    }

    async fn academic_registry_check(
        &self,
        ledger: &mut CheckLedger,
        fields: &mut FieldSet,
    ) -> Option<AcademicRecord> {
        let label = "Academic registry";
        let Some(number) = fields.text(FieldName::DiplomaNumber) else {
            ledger.record(ValidationCheck::new(
                CheckCategory::Registry,
                CheckStatus::Failed,
                label,
                "Diploma number could not be read from the diploma",
                CheckSource::Ocr,
            ));
            return None;
        };

        match self.resolve_academic(&number).await {
            Resolution::Exact(record) => {
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Passed,
                        label,
                        format!("Diploma number {} found in the registry", number),
                        CheckSource::Registry,
                    )
                    .with_extracted(number)
                    .with_similarity(100),
                );
                merge_academic(fields, &record, false);
                Some(record)
            }
            Resolution::Fuzzy(record, score) => {
                tracing::info!(
                    extracted = %number,
                    resolved = %record.diploma_number,
                    score,
                    "diploma number reconciled by fuzzy match"
                );
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Warning,
                        label,
                        format!(
                            "Diploma number {} not found; matched registry record {} (similarity {})",
                            number, record.diploma_number, score
                        ),
                        CheckSource::Registry,
                    )
                    .with_extracted(number)
                    .with_required(record.diploma_number.clone())
                    .with_similarity(score),
                );
                merge_academic(fields, &record, true);
                Some(record)
            }
            Resolution::NotFound => {
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Failed,
                        label,
                        format!("Diploma number {} not found in the registry", number),
                        CheckSource::Registry,
                    )
                    .with_extracted(number),
                );
                None
            }
            Resolution::Unavailable(reason) => {
                tracing::warn!("Academic registry unavailable: {}", reason);
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Warning,
                        label,
                        format!("Academic registry unavailable: {}", reason),
                        CheckSource::Registry,
                    )
                    .with_extracted(number),
                );
                None
            }
        }
    }

    async fn major_check(&self, fields: &FieldSet) -> ValidationCheck {
        let label = "Major compatibility";
        let required = &self.requirements.required_majors;
        let Some(major) = fields.text(FieldName::Major) else {
            return ValidationCheck::new(
                CheckCategory::Major,
                CheckStatus::Warning,
                label,
                "Major not found on the diploma",
                CheckSource::Ocr,
            )
            .with_required(required.join("; "));
        };

        let judgment = self.judge.judge(&major, required).await;
        let matched = judgment
            .matched
            .clone()
            .unwrap_or_else(|| required.join("; "));
        let (status, mut detail) = match judgment.tier {
            CompatibilityTier::Pass => (
                CheckStatus::Passed,
                format!("Major '{}' is compatible with '{}'", major, matched),
            ),
            CompatibilityTier::Review => (
                CheckStatus::Warning,
                format!(
                    "Major '{}' is only partially compatible with '{}'; needs review",
                    major, matched
                ),
            ),
            CompatibilityTier::Fail => (
                CheckStatus::Failed,
                format!("Major '{}' does not match the accepted majors: {}", major, required.join("; ")),
            ),
        };
        if let Some(reason) = &judgment.reason {
            detail = format!("{} ({})", detail, reason);
        }

        ValidationCheck::new(CheckCategory::Major, status, label, detail, judgment.source)
            .with_extracted(major)
            .with_required(matched)
            .with_similarity(judgment.score)
    }

    fn gpa_consistency_check(&self, transcript: f64, recorded: f64) -> ValidationCheck {
        let tolerance = self.requirements.gpa_tolerance;
        let (status, detail) = if (transcript - recorded).abs() <= tolerance + f64::EPSILON {
            (
                CheckStatus::Passed,
                format!("Transcript GPA {:.2} agrees with the diploma record", transcript),
            )
        } else {
            (
                CheckStatus::Warning,
                format!(
                    "Transcript GPA {:.2} differs from the recorded GPA {:.2}",
                    transcript, recorded
                ),
            )
        };
        ValidationCheck::new(
            CheckCategory::Consistency,
            status,
            "GPA consistency",
            detail,
            CheckSource::CrossDocument,
        )
        .with_extracted(format!("{:.2}", transcript))
        .with_required(format!("{:.2}", recorded))
    }
}

/// A registry record that names an identity number must agree with the
/// identity card already validated.
fn identity_link_check(
    record: Option<&AcademicRecord>,
    siblings: &SiblingDocuments,
) -> Option<ValidationCheck> {
    let registered = record?.identity_number.clone()?;
    let on_card = siblings
        .get(DocumentType::Identity)?
        .field_text(FieldName::IdentityNumber)?;

    let check = if registered == on_card {
        ValidationCheck::new(
            CheckCategory::Identity,
            CheckStatus::Passed,
            "Diploma holder",
            "Diploma is registered to the identity card holder",
            CheckSource::CrossDocument,
        )
    } else {
        ValidationCheck::new(
            CheckCategory::Identity,
            CheckStatus::Failed,
            "Diploma holder",
            format!(
                "Diploma is registered to identity number {}, identity card shows {}",
                registered, on_card
            ),
            CheckSource::CrossDocument,
        )
    };
    Some(check.with_extracted(on_card).with_required(registered))
}

fn education_level_check(required: EducationLevel, fields: &FieldSet) -> ValidationCheck {
    let label = "Education level";
    let level = fields
        .text(FieldName::EducationLevel)
        .and_then(|l| l.parse::<EducationLevel>().ok());
    let Some(level) = level else {
        return ValidationCheck::new(
            CheckCategory::EducationLevel,
            CheckStatus::Warning,
            label,
            "Education level not found on the diploma",
            CheckSource::Ocr,
        )
        .with_required(required.code());
    };

    let (status, detail) = if level >= required {
        (
            CheckStatus::Passed,
            format!("Education level {} meets {}", level, required),
        )
    } else {
        (
            CheckStatus::Failed,
            format!("Education level {} is below the required {}", level, required),
        )
    };
    ValidationCheck::new(
        CheckCategory::EducationLevel,
        status,
        label,
        detail,
        source_of(fields, FieldName::EducationLevel),
    )
    .with_extracted(level.code())
    .with_required(required.code())
}

fn merge_academic(fields: &mut FieldSet, record: &AcademicRecord, replace_key: bool) {
    if replace_key {
        fields.insert(
            FieldName::DiplomaNumber,
            ExtractedField::reference(
                FieldName::DiplomaNumber,
                FieldValue::Text(record.diploma_number.clone()),
            ),
        );
    }

    let mut put = |name: FieldName, value: Option<FieldValue>| {
        if let Some(value) = value {
            fields.insert(name, ExtractedField::reference(name, value));
        }
    };
    put(FieldName::FullName, Some(FieldValue::Text(record.full_name.clone())));
    put(FieldName::IdentityNumber, record.identity_number.clone().map(FieldValue::Text));
    put(FieldName::Institution, record.institution.clone().map(FieldValue::Text));
    put(FieldName::Major, record.major.clone().map(FieldValue::Text));
    put(
        FieldName::EducationLevel,
        record
            .education_level
            .map(|l| FieldValue::Text(l.code().to_string())),
    );
    put(FieldName::Gpa, record.gpa.map(FieldValue::Number));
    put(
        FieldName::GraduationYear,
        record.graduation_year.map(|y| FieldValue::Number(f64::from(y))),
    );
}
