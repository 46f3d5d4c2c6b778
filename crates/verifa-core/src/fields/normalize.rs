//! OCR-noise normalization and value parsers.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::identity_number;
use crate::types::{EducationLevel, FieldName, FieldValue};

static ROMAN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[IVXLCDM]{2,}\b").unwrap());

static VALID_ROMAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^M{0,4}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3})$").unwrap()
});

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})$").unwrap());

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

static NAMED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s+([A-Za-z]+)\.?\s+(\d{4})$").unwrap());

/// First private-use code point; protected tokens become one such char each.
const PLACEHOLDER_BASE: u32 = 0xE000;

/// Glyphs OCR commonly reads in place of a digit.
fn confusable_digit(c: char) -> Option<char> {
    match c {
        'I' | 'l' | 'L' => Some('1'),
        'O' | 'o' => Some('0'),
        _ => None,
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | '-' | '/' | ':' | ',')
}

/// Replace confusable glyph runs that sit in a numeric context: directly
/// touching a digit, or forming a whole token whose neighbouring token
/// starts or ends with a digit. Returns whether anything changed.
fn rewrite_confusables(chars: &mut [char]) -> bool {
    let mut changed = false;
    let mut i = 0;

    while i < chars.len() {
        if confusable_digit(chars[i]).is_none() {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && confusable_digit(chars[i]).is_some() {
            i += 1;
        }
        let end = i;

        let at = |idx: Option<usize>| idx.and_then(|j| chars.get(j).copied());
        let prev = at(start.checked_sub(1));
        let next = at(Some(end));

        let touches_digit = prev.is_some_and(|c| c.is_ascii_digit())
            || next.is_some_and(|c| c.is_ascii_digit());

        let whole_token = prev.map_or(true, is_separator) && next.map_or(true, is_separator);
        let beside_digit_token = whole_token
            && (prev.is_some_and(is_separator)
                && at(start.checked_sub(2)).is_some_and(|c| c.is_ascii_digit())
                || next.is_some_and(is_separator)
                    && at(Some(end + 1)).is_some_and(|c| c.is_ascii_digit()));

        if touches_digit || beside_digit_token {
            for c in &mut chars[start..end] {
                if let Some(digit) = confusable_digit(*c) {
                    *c = digit;
                }
            }
            changed = true;
        }
    }

    changed
}

/// Normalize OCR letter/digit confusion in alphanumeric codes.
///
/// Valid multi-letter Roman numerals ("VII", "III") are protected and
/// restored unchanged. Confusable glyphs (I, l, L, O, o) in a numeric
/// context are rewritten to digits. Idempotent.
pub fn normalize_code(text: &str) -> String {
    let mut protected: Vec<String> = Vec::new();
    let masked = ROMAN_TOKEN.replace_all(text, |caps: &regex::Captures| {
        let token = &caps[0];
        if !VALID_ROMAN.is_match(token) {
            return token.to_string();
        }
        match char::from_u32(PLACEHOLDER_BASE + protected.len() as u32) {
            Some(placeholder) => {
                protected.push(token.to_string());
                placeholder.to_string()
            }
            None => token.to_string(),
        }
    });

    let mut chars: Vec<char> = masked.chars().collect();
    while rewrite_confusables(&mut chars) {}

    chars
        .into_iter()
        .map(|c| {
            let index = (c as u32).wrapping_sub(PLACEHOLDER_BASE) as usize;
            match protected.get(index) {
                Some(token) if (c as u32) >= PLACEHOLDER_BASE => token.clone(),
                _ => c.to_string(),
            }
        })
        .collect()
}

/// Month number for an Indonesian or English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "januari" | "january" | "jan" => 1,
        "februari" | "pebruari" | "february" | "feb" | "peb" => 2,
        "maret" | "march" | "mar" => 3,
        "april" | "apr" => 4,
        "mei" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "agustus" | "august" | "agu" | "agt" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nopember" | "nov" | "nop" => 11,
        "desember" | "december" | "des" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse `dd-mm-yyyy`, `dd/mm/yyyy`, `dd.mm.yyyy`, `yyyy-mm-dd` or
/// `dd <month name> yyyy`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Some(caps) = ISO_DATE.captures(text) {
        return NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }
    if let Some(caps) = NUMERIC_DATE.captures(text) {
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?);
    }
    if let Some(caps) = NAMED_DATE.captures(text) {
        let month = month_from_name(&caps[2])?;
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?);
    }
    None
}

/// Parse a GPA on the 4.00 scale; accepts a decimal comma.
pub fn parse_gpa(text: &str) -> Option<f64> {
    let value: f64 = text.trim().replace(',', ".").parse().ok()?;
    (0.0..=4.0).contains(&value).then_some(value)
}

/// Upper-case, single-spaced person name.
pub fn normalize_name(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == ':')
        .to_uppercase()
}

/// "LAKI-LAKI" or "PEREMPUAN" from the spellings found on identity cards.
pub fn normalize_gender(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.starts_with("laki") || lower == "pria" || lower == "male" || lower == "l" {
        Some("LAKI-LAKI")
    } else if lower.starts_with("perempuan") || lower == "wanita" || lower == "female" || lower == "p" {
        Some("PEREMPUAN")
    } else {
        None
    }
}

/// Education level from a code or degree name, also when embedded in a
/// longer phrase such as "Sarjana (S1)".
pub fn parse_level(text: &str) -> Option<EducationLevel> {
    text.trim().parse().ok().or_else(|| {
        text.split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|t| !t.is_empty())
            .find_map(|t| t.parse().ok())
    })
}

/// Collapse whitespace and trim surrounding punctuation.
fn tidy(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == ':' || c == ';')
        .to_string()
}

/// Typed value for a raw string found for `field`, or `None` when the raw
/// string is not a plausible value for that field.
pub fn field_value(field: FieldName, raw: &str, today: NaiveDate) -> Option<FieldValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let value = match field {
        FieldName::IdentityNumber => {
            let digits: String = normalize_code(raw)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if identity_number::decode(&digits, today.year()).is_none() {
                return None;
            }
            FieldValue::Text(digits)
        }
        FieldName::BirthDate => FieldValue::Date(parse_date(raw).filter(|d| *d <= today)?),
        FieldName::Gpa => FieldValue::Number(parse_gpa(raw)?),
        FieldName::GraduationYear => {
            let year: i32 = raw.parse().ok()?;
            if !(1950..=today.year()).contains(&year) {
                return None;
            }
            FieldValue::Number(year as f64)
        }
        FieldName::Gender => FieldValue::Text(normalize_gender(raw)?.to_string()),
        FieldName::EducationLevel => FieldValue::Text(parse_level(raw)?.code().to_string()),
        FieldName::FullName | FieldName::BirthPlace | FieldName::Province | FieldName::City => {
            let name = normalize_name(raw);
            if name.chars().filter(|c| c.is_alphabetic()).count() < 2 {
                return None;
            }
            FieldValue::Text(name)
        }
        FieldName::DiplomaNumber => {
            FieldValue::Text(raw.split_whitespace().collect::<String>().to_uppercase())
        }
        FieldName::Institution | FieldName::Major => FieldValue::Text(tidy(raw)),
    };
    Some(value)
}
