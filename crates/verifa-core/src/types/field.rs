//! Typed field registry for values extracted from documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Known field names.
///
/// The snake_case form is also the key used in generative-extraction
/// schemas, so a typo cannot silently create a new field.
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
pub enum FieldName {
    IdentityNumber,
    FullName,
    BirthPlace,
    BirthDate,
    Gender,
    Province,
    City,
    DiplomaNumber,
    Institution,
    Major,
    EducationLevel,
    Gpa,
    GraduationYear,
}

impl FieldName {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IdentityNumber => "identity number",
            Self::FullName => "full name",
            Self::BirthPlace => "birth place",
            Self::BirthDate => "birth date",
            Self::Gender => "gender",
            Self::Province => "province",
            Self::City => "city",
            Self::DiplomaNumber => "diploma number",
            Self::Institution => "institution",
            Self::Major => "major",
            Self::EducationLevel => "education level",
            Self::Gpa => "GPA",
            Self::GraduationYear => "graduation year",
        }
    }
}

/// Where an extracted value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Regex / heuristic match over OCR text.
    Pattern,
    /// Generative-model extraction.
    Ai,
    /// Authoritative registry record.
    ReferenceLookup,
}

/// Normalized, typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl FieldValue {
    /// Render as display text.
    pub fn as_display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format!("{:.2}", n),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A single extracted field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedField {
    /// Field key.
    pub name: String,
    /// Value as it appeared in the source.
    pub raw_value: String,
    /// Normalized value.
    pub normalized_value: FieldValue,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Producing strategy.
    pub source: FieldSource,
}

impl ExtractedField {
    /// Create a new field for a known name.
    pub fn new(
        name: FieldName,
        raw_value: impl Into<String>,
        normalized_value: FieldValue,
        confidence: f32,
        source: FieldSource,
    ) -> Self {
        Self {
            name: name.to_string(),
            raw_value: raw_value.into(),
            normalized_value,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    /// Create a text field.
    pub fn text(name: FieldName, value: impl Into<String>, confidence: f32, source: FieldSource) -> Self {
        let value = value.into();
        Self::new(name, value.clone(), FieldValue::Text(value), confidence, source)
    }

    /// Create a field from an authoritative registry record.
    pub fn reference(name: FieldName, value: FieldValue) -> Self {
        let raw = value.as_display();
        Self::new(name, raw, value, 1.0, FieldSource::ReferenceLookup)
    }
}

/// Mapping of field name to extracted field, with an extra bucket for
/// fields outside the known set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(flatten)]
    known: BTreeMap<FieldName, ExtractedField>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    extra: BTreeMap<String, ExtractedField>,
}

impl FieldSet {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field.
    ///
    /// A reference-lookup value is never replaced by a pattern or AI value
    /// for the same field. Returns whether the field was stored.
    pub fn insert(&mut self, name: FieldName, field: ExtractedField) -> bool {
        if let Some(existing) = self.known.get(&name) {
            if existing.source == FieldSource::ReferenceLookup
                && field.source != FieldSource::ReferenceLookup
            {
                return false;
            }
        }
        self.known.insert(name, field);
        true
    }

    /// Insert a field that has no [`FieldName`] counterpart.
    pub fn insert_extra(&mut self, key: impl Into<String>, field: ExtractedField) {
        self.extra.insert(key.into(), field);
    }

    /// Get a field.
    pub fn get(&self, name: FieldName) -> Option<&ExtractedField> {
        self.known.get(&name)
    }

    /// Get an extra field.
    pub fn get_extra(&self, key: &str) -> Option<&ExtractedField> {
        self.extra.get(key)
    }

    /// Whether the field is present.
    pub fn contains(&self, name: FieldName) -> bool {
        self.known.contains_key(&name)
    }

    /// Text value of a field (any value kind rendered as text).
    pub fn text(&self, name: FieldName) -> Option<String> {
        self.get(name).map(|f| f.normalized_value.as_display())
    }

    /// Numeric value of a field.
    pub fn number(&self, name: FieldName) -> Option<f64> {
        match self.get(name).map(|f| &f.normalized_value) {
            Some(FieldValue::Number(n)) => Some(*n),
            Some(FieldValue::Text(s)) => s.replace(',', ".").parse().ok(),
            _ => None,
        }
    }

    /// Date value of a field.
    pub fn date(&self, name: FieldName) -> Option<NaiveDate> {
        match self.get(name).map(|f| &f.normalized_value) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// Iterate over known fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &ExtractedField)> {
        self.known.iter()
    }

    /// Number of known fields.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether no known fields are present.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
