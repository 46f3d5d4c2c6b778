//! Parsing of schema-directed field extraction responses.

use serde_json::Value;

use crate::error::{ErrorCode, VerifyError, VerifyResult};
use crate::json_parser::{parse_json_object, require_keys};
use crate::types::FieldName;

/// Confidence assumed when the model omits one.
const DEFAULT_AI_CONFIDENCE: f32 = 0.5;

/// One value reported by the model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AiValue {
    pub key: String,
    pub raw: String,
    pub confidence: f32,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && !s.eq_ignore_ascii_case("null") => {
            Some(s.trim().to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a response of the form `{"fields": {"key": {"value": .., "confidence": ..}}}`.
///
/// Every requested field key must be present (its value may be null);
/// otherwise the response is malformed. Null values are skipped.
pub(crate) fn parse_response(
    response: &str,
    requested: &[FieldName],
    min_length: usize,
) -> VerifyResult<Vec<AiValue>> {
    let root: Value = parse_json_object(response, min_length)?;
    let root = root.as_object().ok_or_else(|| VerifyError::Parse {
        message: "response is not a JSON object".to_string(),
        code: ErrorCode::ParseInvalidJson,
    })?;
    require_keys(root, &["fields"])?;

    let fields = root
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| VerifyError::Parse {
            message: "'fields' is not an object".to_string(),
            code: ErrorCode::ParseInvalidJson,
        })?;

    let keys: Vec<&'static str> = requested.iter().map(|f| <&'static str>::from(*f)).collect();
    require_keys(fields, &keys)?;

    let values = fields
        .iter()
        .filter_map(|(key, entry)| {
            let (raw, confidence) = match entry {
                Value::Object(obj) => (
                    obj.get("value").and_then(value_to_string)?,
                    obj.get("confidence").and_then(Value::as_f64),
                ),
                other => (value_to_string(other)?, None),
            };
            Some(AiValue {
                key: key.clone(),
                raw,
                confidence: confidence
                    .map(|c| c as f32)
                    .unwrap_or(DEFAULT_AI_CONFIDENCE)
                    .clamp(0.0, 1.0),
            })
        })
        .collect();

    Ok(values)
}
