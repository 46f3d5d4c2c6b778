//! Prompt templates for generative calls.

use crate::types::{DocumentType, FieldName};

/// Field descriptions given to the model, keyed by the schema key.
fn field_hint(field: FieldName) -> &'static str {
    match field {
        FieldName::IdentityNumber => "16-digit national identity number (NIK), digits only",
        FieldName::FullName => "full name of the document holder",
        FieldName::BirthPlace => "place of birth",
        FieldName::BirthDate => "date of birth as YYYY-MM-DD",
        FieldName::Gender => "LAKI-LAKI or PEREMPUAN",
        FieldName::Province => "province name",
        FieldName::City => "regency or city name",
        FieldName::DiplomaNumber => "diploma / certificate number exactly as printed",
        FieldName::Institution => "name of the university or school",
        FieldName::Major => "study program or major",
        FieldName::EducationLevel => "degree level code: SMA, D1, D2, D3, D4, S1, S2 or S3",
        FieldName::Gpa => "cumulative GPA on a 4.00 scale, e.g. 3.45",
        FieldName::GraduationYear => "four-digit graduation year",
    }
}

/// System prompt for schema-directed field extraction.
pub fn field_extraction_prompt(doc_type: DocumentType, fields: &[FieldName]) -> String {
    let schema = fields
        .iter()
        .map(|f| format!("- \"{}\": {}", f, field_hint(*f)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a document data extraction system. The text below was read by OCR from an Indonesian {label} and may contain recognition errors.

FIELDS:
{schema}

Output JSON in this exact format:
{{
  "fields": {{
    "<field key>": {{"value": "<value or null>", "confidence": <0.0-1.0>}}
  }}
}}

Rules:
1. Include every field key listed above
2. Use null when the value is not present in the text; never guess
3. Correct obvious OCR letter/digit confusion in numbers
4. "confidence" is how sure you are the value is correct

Return ONLY valid JSON, no other text."#,
        label = doc_type.label(),
        schema = schema
    )
}

/// System prompt for judging whether an academic major satisfies the
/// accepted majors of a position.
pub fn major_compatibility_prompt() -> &'static str {
    r#"You are an academic qualification reviewer. Decide whether a candidate's study program satisfies the study programs accepted for a position.

Consider programs compatible when they belong to the same academic field even if their names differ (for example "Akuntansi Syariah" and "Akuntansi").

Respond ONLY with a JSON object, no other text:
{"score": <0-100>, "matched": "<accepted program that matches best>", "reason": "<one sentence>"}"#
}

/// User message for the major compatibility judgment.
pub fn major_compatibility_message(extracted: &str, required: &[String]) -> String {
    format!(
        "Candidate study program: {}\nAccepted study programs: {}",
        extracted,
        required.join("; ")
    )
}
