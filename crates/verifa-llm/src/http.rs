//! Shared helpers for providers spoken to over plain HTTP.

use secrecy::ExposeSecret;
use verifa_core::error::{ErrorCode, VerifyError, VerifyResult};
use verifa_core::traits::LlmConfig;

/// API key from the config, falling back to an environment variable.
pub(crate) fn api_key(config: &LlmConfig, env_var: &str, provider: &str) -> VerifyResult<String> {
    config
        .api_key
        .as_ref()
        .map(|k| k.expose_secret().clone())
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            VerifyError::Configuration(format!(
                "{} API key not found. Set {} environment variable or provide api_key in config.",
                provider, env_var
            ))
        })
}

/// Map a transport failure.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> VerifyError {
    if err.is_timeout() {
        return VerifyError::timeout(format!("{} request timed out: {}", provider, err));
    }
    VerifyError::Network {
        message: format!("{} request failed: {}", provider, err),
        code: ErrorCode::NetConnectionFailed,
        source: Some(Box::new(err)),
    }
}

/// Read a response, turning non-success statuses into classified errors.
pub(crate) async fn read_body(provider: &str, response: reqwest::Response) -> VerifyResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !status.is_success() {
        tracing::debug!(provider, status = status.as_u16(), "provider returned an error status");
        return Err(VerifyError::from_http_status(
            status.as_u16(),
            &format!("{}: {}", provider, error_message(&body)),
        ));
    }
    Ok(body)
}

/// Pull `error.message` out of a JSON error body, or return the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#),
            "Overloaded"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_api_key_from_config() {
        let config = LlmConfig {
            api_key: Some(secrecy::SecretString::new("sk-test".to_string())),
            ..Default::default()
        };
        assert_eq!(api_key(&config, "VERIFA_TEST_UNSET_KEY", "Test").unwrap(), "sk-test");

        let missing = api_key(&LlmConfig::default(), "VERIFA_TEST_UNSET_KEY", "Test").unwrap_err();
        assert!(missing.is_configuration());
    }
}
