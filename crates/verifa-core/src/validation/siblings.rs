//! Already-validated documents of the same submission.

use std::collections::BTreeMap;

use crate::matching::normalize;
use crate::types::{DocumentType, FieldName, FieldSet};

/// Read-only view of a document that finished validation.
#[derive(Debug, Clone)]
pub struct ValidatedDocument {
    pub document_type: DocumentType,
    pub text: String,
    pub fields: FieldSet,
}

impl ValidatedDocument {
    pub fn new(document_type: DocumentType, text: impl Into<String>, fields: FieldSet) -> Self {
        Self {
            document_type,
            text: text.into(),
            fields,
        }
    }

    /// Case-insensitive containment of `needle` in the document text or in
    /// any of its field values. Punctuation and spacing differences are
    /// ignored.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = normalize(needle);
        if needle.is_empty() {
            return false;
        }
        if normalize(&self.text).contains(&needle) {
            return true;
        }
        self.fields
            .iter()
            .any(|(_, field)| normalize(&field.normalized_value.as_display()).contains(&needle))
    }

    pub fn field_text(&self, name: FieldName) -> Option<String> {
        self.fields.text(name)
    }
}

/// Siblings keyed by document type.
#[derive(Debug, Clone, Default)]
pub struct SiblingDocuments {
    documents: BTreeMap<DocumentType, ValidatedDocument>,
}

impl SiblingDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated document, replacing an earlier one of the same type.
    pub fn insert(&mut self, document: ValidatedDocument) {
        self.documents.insert(document.document_type, document);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, document: ValidatedDocument) -> Self {
        self.insert(document);
        self
    }

    pub fn get(&self, document_type: DocumentType) -> Option<&ValidatedDocument> {
        self.documents.get(&document_type)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
