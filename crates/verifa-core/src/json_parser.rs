//! JSON parsing utilities for generative-model responses.
//!
//! Models wrap JSON in code fences or surround it with prose. These helpers
//! strip the wrapping, locate the outermost object and reject responses that
//! are too short to be an answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::{ErrorCode, VerifyError, VerifyResult};

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:[a-zA-Z0-9]*)?\s*([\s\S]*?)\s*```").unwrap());

static THINK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Remove code fences and thinking tags from a response.
pub fn remove_code_blocks(content: &str) -> String {
    let content = THINK_TAGS.replace_all(content.trim(), "");
    let content = content.trim();

    match CODE_BLOCK.captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => content.to_string(),
    }
}

/// Extract the outermost `{ ... }` object from a response.
pub fn extract_json(text: &str) -> VerifyResult<String> {
    let cleaned = remove_code_blocks(text);

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(cleaned[start..=end].to_string()),
        _ => Err(VerifyError::Parse {
            message: "no JSON object in response".to_string(),
            code: ErrorCode::ParseInvalidJson,
        }),
    }
}

/// Parse a JSON object of type `T` out of a model response.
///
/// Responses shorter than `min_length` are rejected as empty without being
/// parsed.
pub fn parse_json_object<T: DeserializeOwned>(response: &str, min_length: usize) -> VerifyResult<T> {
    if response.trim().chars().count() < min_length {
        return Err(VerifyError::Llm {
            message: "empty response".to_string(),
            code: ErrorCode::LlmEmptyResponse,
            source: None,
        });
    }

    let json = extract_json(response)?;
    serde_json::from_str(&json).map_err(|e| VerifyError::Parse {
        message: format!("Failed to parse response JSON: {}", e),
        code: ErrorCode::ParseInvalidJson,
    })
}

/// Fail with `ParseMissingField` unless `object` has every key in `keys`.
pub fn require_keys(object: &serde_json::Map<String, serde_json::Value>, keys: &[&str]) -> VerifyResult<()> {
    match keys.iter().find(|k| !object.contains_key(**k)) {
        Some(missing) => Err(VerifyError::Parse {
            message: format!("response is missing key '{}'", missing),
            code: ErrorCode::ParseMissingField,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Answer {
        score: u8,
    }

    #[test]
    fn test_extract_json_from_code_block() {
        let input = "```json\n{\"score\": 80}\n```";
        assert_eq!(extract_json(input).unwrap(), "{\"score\": 80}");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let input = "Sure! Here is the result: {\"score\": 80, \"nested\": {\"a\": 1}} Hope it helps.";
        let answer: Answer = parse_json_object(input, 10).unwrap();
        assert_eq!(answer.score, 80);
    }

    #[test]
    fn test_remove_think_tags() {
        let input = "<think>reasoning</think>\n```\n{\"score\": 1}\n```";
        assert_eq!(remove_code_blocks(input), "{\"score\": 1}");
    }

    #[test]
    fn test_short_response_rejected_as_empty() {
        let err = parse_json_object::<Answer>("{}", 10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::LlmEmptyResponse);
    }

    #[test]
    fn test_no_object() {
        let err = parse_json_object::<Answer>("I cannot read this document.", 10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseInvalidJson);
    }

    #[test]
    fn test_require_keys() {
        let value: serde_json::Value = serde_json::json!({"fields": {}, "x": 1});
        let object = value.as_object().unwrap();
        assert!(require_keys(object, &["fields"]).is_ok());
        assert_eq!(
            require_keys(object, &["fields", "score"]).unwrap_err().code(),
            ErrorCode::ParseMissingField
        );
    }
}
