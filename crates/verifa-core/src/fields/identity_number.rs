//! Structure of the 16-digit national identity number (NIK).
//!
//! Layout: `PP KK CC DDMMYY SSSS`: province, regency, district, birth date
//! (day + 40 for women) and a serial number.

use chrono::NaiveDate;

/// Decoded identity number segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityNumberInfo {
    pub province_code: u8,
    /// Birth date when the date segment is a real calendar date.
    pub birth_date: Option<NaiveDate>,
    /// "LAKI-LAKI" or "PEREMPUAN", when the day segment is in range.
    pub gender: Option<&'static str>,
}

fn two_digits(s: &str, at: usize) -> Option<u32> {
    s.get(at..at + 2)?.parse().ok()
}

fn is_sixteen_digits(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Decode the segments of a 16-digit identity number.
///
/// Two-digit birth years are placed in the century that keeps the date at
/// or before `reference_year`.
pub fn decode(number: &str, reference_year: i32) -> Option<IdentityNumberInfo> {
    if !is_sixteen_digits(number) {
        return None;
    }

    let province_code = two_digits(number, 0)? as u8;
    let day = two_digits(number, 6)?;
    let month = two_digits(number, 8)?;
    let year = two_digits(number, 10)? as i32;

    let (day, gender) = match day {
        1..=31 => (day, Some("LAKI-LAKI")),
        41..=71 => (day - 40, Some("PEREMPUAN")),
        _ => (day, None),
    };

    let century = if 2000 + year <= reference_year { 2000 } else { 1900 };
    let birth_date = gender
        .and_then(|_| NaiveDate::from_ymd_opt(century + year, month, day));

    Some(IdentityNumberInfo {
        province_code,
        birth_date,
        gender,
    })
}

/// Whether the province code is in the assigned range.
pub fn has_valid_province(number: &str) -> bool {
    is_sixteen_digits(number)
        && two_digits(number, 0).is_some_and(|p| (11..=94).contains(&p))
}

/// Full structural check used for unlabeled candidates: valid province
/// code and a real birth date in the date segment.
pub fn is_plausible(number: &str, reference_year: i32) -> bool {
    has_valid_province(number)
        && decode(number, reference_year).is_some_and(|info| info.birth_date.is_some())
}
