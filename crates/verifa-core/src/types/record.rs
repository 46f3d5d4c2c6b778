//! Read-only reference records served by the registry collaborators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Academic degree level, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    #[serde(rename = "SMA")]
    HighSchool,
    D1,
    D2,
    D3,
    D4,
    S1,
    S2,
    S3,
}

impl EducationLevel {
    /// Short code as printed on Indonesian diplomas.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HighSchool => "SMA",
            Self::D1 => "D1",
            Self::D2 => "D2",
            Self::D3 => "D3",
            Self::D4 => "D4",
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
        }
    }
}

impl std::fmt::Display for EducationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EducationLevel {
    type Err = String;

    /// Parse codes ("S1", "S-1", "D III") and spelled-out degree names
    /// ("Sarjana", "Magister", "Diploma III").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper: String = s
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
            .collect();

        let level = match upper.as_str() {
            "SMA" | "SMK" | "SLTA" | "MA" => Self::HighSchool,
            "D1" | "DI" | "DIPLOMAI" | "DIPLOMA1" => Self::D1,
            "D2" | "DII" | "DIPLOMAII" | "DIPLOMA2" => Self::D2,
            "D3" | "DIII" | "DIPLOMAIII" | "DIPLOMA3" | "AHLIMADYA" => Self::D3,
            "D4" | "DIV" | "DIPLOMAIV" | "DIPLOMA4" | "SARJANATERAPAN" => Self::D4,
            "S1" | "SARJANA" | "STRATA1" | "STRATAI" | "BACHELOR" => Self::S1,
            "S2" | "MAGISTER" | "STRATA2" | "STRATAII" | "MASTER" => Self::S2,
            "S3" | "DOKTOR" | "STRATA3" | "STRATAIII" | "DOCTOR" => Self::S3,
            _ => return Err(format!("unknown education level: {}", s)),
        };
        Ok(level)
    }
}

/// Identity registry record, keyed by identity number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub identity_number: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl IdentityRecord {
    /// Create a record with the mandatory fields.
    pub fn new(identity_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            identity_number: identity_number.into(),
            full_name: full_name.into(),
            birth_place: None,
            birth_date: None,
            gender: None,
            province: None,
            city: None,
        }
    }

    /// Builder: set birth date.
    pub fn with_birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Builder: set birth place.
    pub fn with_birth_place(mut self, place: impl Into<String>) -> Self {
        self.birth_place = Some(place.into());
        self
    }

    /// Builder: set province.
    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }
}

/// Academic registry record, keyed by diploma number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub diploma_number: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_level: Option<EducationLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
}

impl AcademicRecord {
    /// Create a record with the mandatory fields.
    pub fn new(diploma_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            diploma_number: diploma_number.into(),
            full_name: full_name.into(),
            identity_number: None,
            institution: None,
            major: None,
            education_level: None,
            gpa: None,
            graduation_year: None,
        }
    }

    /// Builder: set major.
    pub fn with_major(mut self, major: impl Into<String>) -> Self {
        self.major = Some(major.into());
        self
    }

    /// Builder: set GPA.
    pub fn with_gpa(mut self, gpa: f64) -> Self {
        self.gpa = Some(gpa);
        self
    }

    /// Builder: set education level.
    pub fn with_level(mut self, level: EducationLevel) -> Self {
        self.education_level = Some(level);
        self
    }

    /// Builder: set institution.
    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = Some(institution.into());
        self
    }
}
