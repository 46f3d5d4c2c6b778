//! Identity card rules.

use super::ledger::CheckLedger;
use super::validator::{
    age_on, completeness_check, similarity_of, source_of, CrossDocumentValidator, Resolution,
};
use crate::types::{
    CheckCategory, CheckSource, CheckStatus, DocumentType, ExtractedField, FieldName, FieldSet,
    FieldValue, IdentityRecord, ValidationCheck,
};

impl CrossDocumentValidator {
    /// Registry, completeness, name, age and location, in that order.
    pub(crate) async fn validate_identity(
        &self,
        ledger: &mut CheckLedger,
        fields: &mut FieldSet,
        gaps: &[FieldName],
    ) {
        let printed_name = fields.text(FieldName::FullName);

        let record = self.identity_registry_check(ledger, fields).await;
        ledger.record(completeness_check(DocumentType::Identity, fields, gaps));

        if let Some(record) = &record {
            ledger.record(self.printed_name_check(printed_name, record));
        }
        ledger.record(self.age_check(fields));

        if let Some(formation) = &self.requirements.formation_province {
            ledger.record(self.location_check(formation, fields));
        }
    }

    pub(crate) async fn resolve_identity(&self, number: &str) -> Resolution<IdentityRecord> {
        match self.identities.find_identity(number).await {
            Ok(Some(record)) => Resolution::Exact(record),
            Ok(None) => {
                let prefix = self.candidate_prefix(number);
                match self
                    .identities
                    .identity_candidates(prefix, self.matching.candidate_limit)
                    .await
                {
                    Ok(candidates) => {
                        self.resolve_best(number, candidates, |r| r.identity_number.as_str())
                    }
                    Err(e) => Resolution::Unavailable(e.to_string()),
                }
            }
            Err(e) => Resolution::Unavailable(e.to_string()),
        }
    }

    /// Resolve the identity number and merge the record into `fields`.
    async fn identity_registry_check(
        &self,
        ledger: &mut CheckLedger,
        fields: &mut FieldSet,
    ) -> Option<IdentityRecord> {
        let label = "Identity registry";
        let Some(number) = fields.text(FieldName::IdentityNumber) else {
            ledger.record(ValidationCheck::new(
                CheckCategory::Registry,
                CheckStatus::Failed,
                label,
                "Identity number could not be read from the identity card",
                CheckSource::Ocr,
            ));
            return None;
        };

        match self.resolve_identity(&number).await {
            Resolution::Exact(record) => {
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Passed,
                        label,
                        format!("Identity number {} found in the registry", number),
                        CheckSource::Registry,
                    )
                    .with_extracted(number)
                    .with_similarity(100),
                );
                merge_identity(fields, &record, false);
                Some(record)
            }
            Resolution::Fuzzy(record, score) => {
                tracing::info!(
                    extracted = %number,
                    resolved = %record.identity_number,
                    score,
                    "identity number reconciled by fuzzy match"
                );
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Warning,
                        label,
                        format!(
                            "Identity number {} not found; matched registry record {} (similarity {})",
                            number, record.identity_number, score
                        ),
                        CheckSource::Registry,
                    )
                    .with_extracted(number)
                    .with_required(record.identity_number.clone())
                    .with_similarity(score),
                );
                merge_identity(fields, &record, true);
                Some(record)
            }
            Resolution::NotFound => {
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Failed,
                        label,
                        format!("Identity number {} not found in the registry", number),
                        CheckSource::Registry,
                    )
                    .with_extracted(number),
                );
                None
            }
            Resolution::Unavailable(reason) => {
                tracing::warn!("Identity registry unavailable: {}", reason);
                ledger.record(
                    ValidationCheck::new(
                        CheckCategory::Registry,
                        CheckStatus::Warning,
                        label,
                        format!("Identity registry unavailable: {}", reason),
                        CheckSource::Registry,
                    )
                    .with_extracted(number),
                );
                None
            }
        }
    }

    /// The printed name must agree with the registry name.
    fn printed_name_check(&self, printed: Option<String>, record: &IdentityRecord) -> ValidationCheck {
        let label = "Name matches registry";
        let Some(printed) = printed else {
            return ValidationCheck::new(
                CheckCategory::Identity,
                CheckStatus::Warning,
                label,
                format!(
                    "Name not readable on the identity card; using registry name '{}'",
                    record.full_name
                ),
                CheckSource::Registry,
            )
            .with_required(record.full_name.clone());
        };

        let score = similarity_of(Some(&printed), Some(&record.full_name));
        let check = if score >= self.matching.fuzzy_floor {
            ValidationCheck::new(
                CheckCategory::Identity,
                CheckStatus::Passed,
                label,
                format!("Name '{}' matches the registry", printed),
                CheckSource::Registry,
            )
        } else {
            ValidationCheck::new(
                CheckCategory::Identity,
                CheckStatus::Failed,
                label,
                format!(
                    "Name '{}' on the identity card does not match registry name '{}'",
                    printed, record.full_name
                ),
                CheckSource::Registry,
            )
        };
        check
            .with_extracted(printed)
            .with_required(record.full_name.clone())
            .with_similarity(score)
    }

    /// Age must fall within the configured range. Absence fails.
    fn age_check(&self, fields: &FieldSet) -> ValidationCheck {
        let label = "Age requirement";
        let (min, max) = (self.requirements.min_age as i32, self.requirements.max_age as i32);
        let range = format!("{}-{}", min, max);

        let Some(birth) = fields.date(FieldName::BirthDate) else {
            return ValidationCheck::new(
                CheckCategory::Age,
                CheckStatus::Failed,
                label,
                "Birth date unavailable; age cannot be verified",
                CheckSource::Rule,
            )
            .with_required(range);
        };

        let age = age_on(birth, self.requirements.today());
        let source = source_of(fields, FieldName::BirthDate);
        let (status, detail) = if age < min || age > max {
            (
                CheckStatus::Failed,
                format!("Age {} is outside the allowed range {}", age, range),
            )
        } else if source == CheckSource::Registry {
            (
                CheckStatus::Passed,
                format!("Age {} is within {} (born {})", age, range, birth),
            )
        } else {
            (
                CheckStatus::Warning,
                format!(
                    "Age {} is within {} but the birth date {} was not confirmed by the registry",
                    age, range, birth
                ),
            )
        };

        ValidationCheck::new(CheckCategory::Age, status, label, detail, source)
            .with_extracted(age.to_string())
            .with_required(range)
    }

    /// Geography is advisory: a mismatch is a warning.
    fn location_check(&self, formation: &str, fields: &FieldSet) -> ValidationCheck {
        let label = "Formation province";
        let province = fields.text(FieldName::Province);
        let score = similarity_of(province.as_deref(), Some(formation));

        let (status, detail) = match &province {
            None => (
                CheckStatus::Warning,
                "Province of residence unavailable".to_string(),
            ),
            Some(p) if score >= self.matching.fuzzy_floor => (
                CheckStatus::Passed,
                format!("Registered in {}", p),
            ),
            Some(p) => (
                CheckStatus::Warning,
                format!(
                    "Registered province {} differs from formation province {}",
                    p, formation
                ),
            ),
        };

        let check = ValidationCheck::new(
            CheckCategory::Location,
            status,
            label,
            detail,
            source_of(fields, FieldName::Province),
        )
        .with_required(formation);
        match province {
            Some(p) => check.with_extracted(p).with_similarity(score),
            None => check,
        }
    }
}

/// Registry values replace OCR values. The identity number itself is only
/// replaced when it was reconciled by fuzzy match.
fn merge_identity(fields: &mut FieldSet, record: &IdentityRecord, replace_key: bool) {
    if replace_key {
        fields.insert(
            FieldName::IdentityNumber,
            ExtractedField::reference(
                FieldName::IdentityNumber,
                FieldValue::Text(record.identity_number.clone()),
            ),
        );
    }

    let mut put = |name: FieldName, value: Option<FieldValue>| {
        if let Some(value) = value {
            fields.insert(name, ExtractedField::reference(name, value));
        }
    };
    put(FieldName::FullName, Some(FieldValue::Text(record.full_name.clone())));
    put(FieldName::BirthPlace, record.birth_place.clone().map(FieldValue::Text));
    put(FieldName::BirthDate, record.birth_date.map(FieldValue::Date));
    put(FieldName::Gender, record.gender.clone().map(FieldValue::Text));
    put(FieldName::Province, record.province.clone().map(FieldValue::Text));
    put(FieldName::City, record.city.clone().map(FieldValue::Text));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchingConfig, Requirements};
    use crate::error::VerifyError;
    use crate::fields::FieldExtraction;
    use crate::registry::InMemoryRegistry;
    use crate::traits::{MockAcademicRegistry, MockIdentityRegistry};
    use crate::types::{EngineKind, ExtractionResult, FieldSource};
    use crate::validation::SiblingDocuments;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn requirements() -> Requirements {
        Requirements {
            reference_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            ..Default::default()
        }
    }

    fn validator(registry: InMemoryRegistry) -> CrossDocumentValidator {
        let registry = Arc::new(registry);
        CrossDocumentValidator::new(
            requirements(),
            MatchingConfig::default(),
            registry.clone(),
            registry,
        )
    }

    fn extraction(entries: &[(FieldName, FieldValue)]) -> FieldExtraction {
        let mut fields = FieldSet::new();
        for (name, value) in entries {
            fields.insert(
                *name,
                ExtractedField::new(*name, value.as_display(), value.clone(), 0.8, FieldSource::Pattern),
            );
        }
        FieldExtraction {
            fields,
            gaps: Vec::new(),
        }
    }

    fn ocr() -> ExtractionResult {
        ExtractionResult::new("NIK: 3201234567890123", 0.9, EngineKind::LocalOcr, 1)
    }

    fn nik(value: &str) -> (FieldName, FieldValue) {
        (FieldName::IdentityNumber, FieldValue::Text(value.to_string()))
    }

    fn budi() -> IdentityRecord {
        IdentityRecord::new("3201234567890123", "BUDI SANTOSO")
            .with_birth_date(NaiveDate::from_ymd_opt(1995, 5, 15).unwrap())
            .with_province("JAWA BARAT")
    }

    #[tokio::test]
    async fn test_age_uses_registry_birth_date() {
        let validator = validator(InMemoryRegistry::new().with_identity(budi()));
        // OCR read a different birth date; the registry wins.
        let input = extraction(&[
            nik("3201234567890123"),
            (
                FieldName::BirthDate,
                FieldValue::Date(NaiveDate::from_ymd_opt(1985, 1, 1).unwrap()),
            ),
        ]);

        let result = validator
            .validate(DocumentType::Identity, &ocr(), input, &SiblingDocuments::new())
            .await;

        let age = result.check(CheckCategory::Age).unwrap();
        assert_eq!(age.status, CheckStatus::Passed);
        assert_eq!(age.extracted_value.as_deref(), Some("31"));
        assert_eq!(age.source, CheckSource::Registry);
        assert_eq!(
            result.extracted_data.date(FieldName::BirthDate),
            NaiveDate::from_ymd_opt(1995, 5, 15)
        );
        assert_eq!(
            result.extracted_data.get(FieldName::IdentityNumber).unwrap().source,
            FieldSource::Pattern
        );
        assert_eq!(
            result.check(CheckCategory::Registry).unwrap().status,
            CheckStatus::Passed
        );
    }

    #[tokio::test]
    async fn test_unknown_identity_fails() {
        let validator = validator(InMemoryRegistry::new().with_identity(budi()));
        let input = extraction(&[nik("7371010101900001")]);

        let result = validator
            .validate(DocumentType::Identity, &ocr(), input, &SiblingDocuments::new())
            .await;

        assert!(!result.success);
        assert_eq!(
            result.check(CheckCategory::Registry).unwrap().status,
            CheckStatus::Failed
        );
        // No birth date anywhere: age is safety-critical.
        assert_eq!(result.check(CheckCategory::Age).unwrap().status, CheckStatus::Failed);
    }

    #[tokio::test]
    async fn test_fuzzy_identity_match_is_warning() {
        let validator = validator(InMemoryRegistry::new().with_identity(budi()));
        // One digit misread.
        let input = extraction(&[nik("3201234567890128")]);

        let result = validator
            .validate(DocumentType::Identity, &ocr(), input, &SiblingDocuments::new())
            .await;

        let registry = result.check(CheckCategory::Registry).unwrap();
        assert_eq!(registry.status, CheckStatus::Warning);
        assert_eq!(registry.required_value.as_deref(), Some("3201234567890123"));
        assert!(registry.similarity.unwrap() >= 80);
        assert_eq!(
            result.extracted_data.text(FieldName::IdentityNumber).as_deref(),
            Some("3201234567890123")
        );
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_name_mismatch_is_error_province_mismatch_is_warning() {
        let registry = Arc::new(InMemoryRegistry::new().with_identity(budi()));
        let validator = CrossDocumentValidator::new(
            Requirements {
                formation_province: Some("JAWA TIMUR".to_string()),
                ..requirements()
            },
            MatchingConfig::default(),
            registry.clone(),
            registry,
        );
        let input = extraction(&[
            nik("3201234567890123"),
            (FieldName::FullName, FieldValue::Text("SITI AMINAH".into())),
        ]);

        let result = validator
            .validate(DocumentType::Identity, &ocr(), input, &SiblingDocuments::new())
            .await;

        assert_eq!(
            result.check(CheckCategory::Identity).unwrap().status,
            CheckStatus::Failed
        );
        assert_eq!(
            result.check(CheckCategory::Location).unwrap().status,
            CheckStatus::Warning
        );
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_registry_outage_is_warning() {
        let mut identities = MockIdentityRegistry::new();
        identities
            .expect_find_identity()
            .returning(|_| Err(VerifyError::registry("connection refused")));
        let validator = CrossDocumentValidator::new(
            requirements(),
            MatchingConfig::default(),
            Arc::new(identities),
            Arc::new(MockAcademicRegistry::new()),
        );
        let input = extraction(&[
            nik("3201011505950001"),
            (
                FieldName::BirthDate,
                FieldValue::Date(NaiveDate::from_ymd_opt(1995, 5, 15).unwrap()),
            ),
        ]);

        let result = validator
            .validate(DocumentType::Identity, &ocr(), input, &SiblingDocuments::new())
            .await;

        assert!(result.success);
        assert_eq!(
            result.check(CheckCategory::Registry).unwrap().status,
            CheckStatus::Warning
        );
        // OCR-derived birth date within range, but unconfirmed.
        assert_eq!(result.check(CheckCategory::Age).unwrap().status, CheckStatus::Warning);
    }
}
