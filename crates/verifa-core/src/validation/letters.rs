//! Application and statement letter rules. All of them are advisory except
//! the name cross-check.

use super::ledger::CheckLedger;
use super::siblings::SiblingDocuments;
use super::validator::CrossDocumentValidator;
use crate::matching::normalize;
use crate::types::{
    CheckCategory, CheckSource, CheckStatus, DocumentType, FieldName, FieldSet, ValidationCheck,
};

impl CrossDocumentValidator {
    pub(crate) fn validate_letter(
        &self,
        doc_type: DocumentType,
        ledger: &mut CheckLedger,
        text: &str,
        fields: &FieldSet,
        siblings: &SiblingDocuments,
    ) {
        ledger.record(self.letter_length_check(doc_type, text));
        ledger.record(self.letter_keywords_check(doc_type, text));

        if let Some(formation) = &self.requirements.formation_name {
            ledger.record(formation_mention_check(doc_type, text, formation));
        }

        ledger.record(self.name_consistency_check(
            doc_type,
            fields.text(FieldName::FullName),
            siblings,
        ));
    }

    fn keywords_for(&self, doc_type: DocumentType) -> &[String] {
        match doc_type {
            DocumentType::StatementLetter => &self.requirements.statement_keywords,
            _ => &self.requirements.application_keywords,
        }
    }

    fn letter_length_check(&self, doc_type: DocumentType, text: &str) -> ValidationCheck {
        let min = self.requirements.min_letter_length;
        let length = text.trim().chars().count();
        let (status, detail) = if length >= min {
            (
                CheckStatus::Passed,
                format!("The {} has {} characters", doc_type.label(), length),
            )
        } else {
            (
                CheckStatus::Warning,
                format!(
                    "The {} is too short ({} characters, expected at least {})",
                    doc_type.label(),
                    length,
                    min
                ),
            )
        };
        ValidationCheck::new(
            CheckCategory::Completeness,
            status,
            "Letter length",
            detail,
            CheckSource::Rule,
        )
        .with_extracted(length.to_string())
        .with_required(min.to_string())
    }

    fn letter_keywords_check(&self, doc_type: DocumentType, text: &str) -> ValidationCheck {
        let haystack = normalize(text);
        let keywords = self.keywords_for(doc_type);
        let missing: Vec<&str> = keywords
            .iter()
            .filter(|k| !haystack.contains(&normalize(k)))
            .map(String::as_str)
            .collect();

        let (status, detail) = if missing.is_empty() {
            (
                CheckStatus::Passed,
                format!("The {} contains the required wording", doc_type.label()),
            )
        } else {
            (
                CheckStatus::Warning,
                format!(
                    "The {} does not mention: {}",
                    doc_type.label(),
                    missing.join(", ")
                ),
            )
        };
        ValidationCheck::new(
            CheckCategory::Completeness,
            status,
            "Letter wording",
            detail,
            CheckSource::Rule,
        )
        .with_required(keywords.join(", "))
    }
}

fn formation_mention_check(doc_type: DocumentType, text: &str, formation: &str) -> ValidationCheck {
    let mentioned = normalize(text).contains(&normalize(formation));
    let (status, detail) = if mentioned {
        (
            CheckStatus::Passed,
            format!("The {} names the position {}", doc_type.label(), formation),
        )
    } else {
        (
            CheckStatus::Warning,
            format!(
                "The {} does not name the position {}",
                doc_type.label(),
                formation
            ),
        )
    };
    ValidationCheck::new(
        CheckCategory::Consistency,
        status,
        "Position named",
        detail,
        CheckSource::Rule,
    )
    .with_required(formation)
}
