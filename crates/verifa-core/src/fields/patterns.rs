//! Deterministic field patterns.
//!
//! Labeled patterns anchor on a label token ("NIK", "IPK", "Nama") and read
//! the value within a bounded window after it. Structural patterns look for
//! the shape of a value anywhere in the text and validate its range.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::identity_number;
use super::normalize::{field_value, parse_gpa};
use crate::types::{FieldName, FieldSet, FieldValue};

const DATE: &str = r"[0-9]{1,2}[-/.][0-9]{1,2}[-/.][0-9]{4}|[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{1,2}[ \t]+[A-Za-z]+\.?[ \t]+[0-9]{4}";

static NIK_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNIK\b[^0-9\n]{0,10}([0-9]{16})\b").unwrap());

static NIK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([0-9]{16})\b").unwrap());

static NAME_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:nama(?:[ \t]+lengkap)?|full[ \t]+name|name)[ \t]*:[ \t]*([A-Za-z][A-Za-z .,'-]{1,60}?)[ \t]*$",
    )
    .unwrap()
});

static NAME_AWARDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:diberikan[ \t]+kepada|awarded[ \t]+to)[ \t]*:?[ \t]*\n?[ \t]*([A-Za-z][A-Za-z .,'-]{2,60}?)[ \t]*(?:\n|$)").unwrap()
});

static PLACE_AND_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)tempat[ \t]*[/,][ \t]*(?:tgl\.?|tanggal)[ \t]*lahir[ \t]*:?[ \t]*([A-Za-z .]+?)[ \t]*,[ \t]*({})",
        DATE
    ))
    .unwrap()
});

static BIRTH_DATE_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:tanggal|tgl\.?)[ \t]*lahir[ \t]*:?[ \t]*({})",
        DATE
    ))
    .unwrap()
});

static GENDER_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)jenis[ \t]+kelamin[ \t]*:?[ \t]*(laki[ \t]*-?[ \t]*laki|perempuan|wanita|pria)")
        .unwrap()
});

static PROVINCE_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*provinsi[ \t]+([A-Za-z .]{3,40}?)[ \t]*$").unwrap()
});

static CITY_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*((?:kabupaten|kota)[ \t]+[A-Za-z .]{3,40}?)[ \t]*$").unwrap()
});

static DIPLOMA_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:no(?:mor)?\.?[ \t]*(?:seri[ \t]+)?ijazah(?:[ \t]+nasional)?|\bNIN\b|\bPIN\b)[ \t]*:?[ \t]*([A-Z0-9][A-Z0-9./-]{5,30})",
    )
    .unwrap()
});

static DIPLOMA_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]{1,4}[-/.]?[0-9]{2,}(?:[-/.][A-Za-z0-9]{1,10}){1,4})\b").unwrap()
});

static INSTITUTION_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(?:nama[ \t]+)?(?:perguruan[ \t]+tinggi|institusi|institution|university)[ \t]*:[ \t]*([^\n]{3,80}?)[ \t]*$",
    )
    .unwrap()
});

static INSTITUTION_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b((?:universitas|institut|sekolah[ \t]+tinggi|politeknik|akademi|university[ \t]+of|institute[ \t]+of)[ \t]+[A-Za-z .&'-]{2,60})",
    )
    .unwrap()
});

static MAJOR_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(?:program[ \t]+studi|prodi|jurusan|study[ \t]+program|major)[ \t]*:?[ \t]*([A-Za-z][A-Za-z &().-]{2,60}?)[ \t]*$",
    )
    .unwrap()
});

static LEVEL_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(?:jenjang(?:[ \t]+pendidikan)?|strata|degree|program[ \t]+pendidikan)[ \t]*:?[ \t]*([A-Za-z0-9() -]{1,30}?)[ \t]*$",
    )
    .unwrap()
});

static LEVEL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(S-?[123]|D-?(?:III|IV|[1-4]))\b|(?i:\b(sarjana|magister|doktor|ahli[ \t]+madya|diploma[ \t]+(?:iii|iv|[1-4]))\b)",
    )
    .unwrap()
});

static GPA_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\bIPK\b|\bGPA\b|indeks[ \t]+prestasi[ \t]+kumulatif)[^0-9\n]{0,15}([0-4][.,][0-9]{1,2})\b",
    )
    .unwrap()
});

static GPA_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([0-4][.,][0-9]{2})\b").unwrap());

static YEAR_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:tahun[ \t]+lulus|lulus[ \t]+(?:tahun|pada)|tanggal[ \t]+lulus|graduated|year[ \t]+of[ \t]+graduation)[^0-9\n]{0,25}(?:[0-9]{1,2}[-/. ][A-Za-z0-9]+\.?[-/. ])?((?:19|20)[0-9]{2})\b",
    )
    .unwrap()
});

/// Confidence weight of a labeled match before OCR confidence is applied.
pub(crate) const LABELED_WEIGHT: f32 = 0.9;
/// Confidence weight of a structural match.
pub(crate) const STRUCTURAL_WEIGHT: f32 = 0.7;

/// A raw match with its typed value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub raw: String,
    pub value: FieldValue,
    pub weight: f32,
}

fn capture(re: &Regex, text: &str, group: usize) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str().to_string())
}

fn candidate(field: FieldName, raw: String, today: NaiveDate, weight: f32) -> Option<Candidate> {
    let value = field_value(field, &raw, today)?;
    Some(Candidate { raw, value, weight })
}

/// Labeled-pattern match for `field`.
pub(crate) fn labeled(field: FieldName, text: &str, today: NaiveDate) -> Option<Candidate> {
    let raw = match field {
        FieldName::IdentityNumber => capture(&NIK_LABELED, text, 1)
            .filter(|n| identity_number::has_valid_province(n)),
        FieldName::FullName => {
            capture(&NAME_LABELED, text, 1).or_else(|| capture(&NAME_AWARDED, text, 1))
        }
        FieldName::BirthPlace => capture(&PLACE_AND_DATE, text, 1),
        FieldName::BirthDate => capture(&PLACE_AND_DATE, text, 2)
            .or_else(|| capture(&BIRTH_DATE_LABELED, text, 1)),
        FieldName::Gender => capture(&GENDER_LABELED, text, 1),
        FieldName::Province => capture(&PROVINCE_LABELED, text, 1),
        FieldName::City => capture(&CITY_LABELED, text, 1),
        FieldName::DiplomaNumber => capture(&DIPLOMA_LABELED, text, 1),
        FieldName::Institution => capture(&INSTITUTION_LABELED, text, 1),
        FieldName::Major => capture(&MAJOR_LABELED, text, 1),
        FieldName::EducationLevel => capture(&LEVEL_LABELED, text, 1),
        FieldName::Gpa => capture(&GPA_LABELED, text, 1),
        FieldName::GraduationYear => capture(&YEAR_LABELED, text, 1),
    }?;
    candidate(field, raw, today, LABELED_WEIGHT)
}

/// Unlabeled structural match for `field`. Fields already found may feed
/// derived values (birth date and gender from the identity number).
pub(crate) fn structural(
    field: FieldName,
    text: &str,
    today: NaiveDate,
    found: &FieldSet,
) -> Option<Candidate> {
    match field {
        FieldName::IdentityNumber => NIK_RUN
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|n| identity_number::is_plausible(n, today.year()))
            .and_then(|n| candidate(field, n.to_string(), today, STRUCTURAL_WEIGHT)),
        FieldName::BirthDate | FieldName::Gender => {
            let number = found.text(FieldName::IdentityNumber)?;
            let info = identity_number::decode(&number, today.year())?;
            let birth_date = info.birth_date.filter(|d| *d <= today)?;
            let value = if field == FieldName::BirthDate {
                FieldValue::Date(birth_date)
            } else {
                FieldValue::Text(info.gender?.to_string())
            };
            Some(Candidate {
                raw: number,
                value,
                weight: STRUCTURAL_WEIGHT,
            })
        }
        FieldName::DiplomaNumber => DIPLOMA_SHAPE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .find(|s| s.chars().filter(|c| c.is_ascii_digit()).count() >= 5)
            .and_then(|s| candidate(field, s, today, STRUCTURAL_WEIGHT)),
        FieldName::Institution => capture(&INSTITUTION_SHAPE, text, 1)
            .and_then(|s| candidate(field, s, today, STRUCTURAL_WEIGHT)),
        FieldName::EducationLevel => LEVEL_SHAPE
            .captures(text)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .and_then(|m| candidate(field, m.as_str().to_string(), today, STRUCTURAL_WEIGHT)),
        FieldName::Gpa => last_plausible_gpa(text)
            .and_then(|s| candidate(field, s, today, STRUCTURAL_WEIGHT)),
        _ => None,
    }
}

/// Last `[0-4].dd` value in reading order that is not a scale maximum
/// ("dari 4.00", "/ 4.00").
fn last_plausible_gpa(text: &str) -> Option<String> {
    GPA_SHAPE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter(|m| {
            let before = text[..m.start()].trim_end().to_lowercase();
            !(before.ends_with('/')
                || before.ends_with("dari")
                || before.ends_with("of")
                || before.ends_with("skala"))
        })
        .map(|m| m.as_str().to_string())
        .filter(|s| parse_gpa(s).is_some())
        .last()
}

/// Fields a structural match derives from other fields.
pub(crate) fn is_derived_field(field: FieldName) -> bool {
    matches!(field, FieldName::BirthDate | FieldName::Gender)
}

/// Fields whose values are alphanumeric codes and benefit from OCR-noise
/// normalization before matching.
pub(crate) fn is_code_field(field: FieldName) -> bool {
    matches!(
        field,
        FieldName::IdentityNumber
            | FieldName::DiplomaNumber
            | FieldName::Gpa
            | FieldName::GraduationYear
    )
}
