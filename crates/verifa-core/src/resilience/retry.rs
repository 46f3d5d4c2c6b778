//! Retry with exponential backoff and fallback targets.

use std::future::Future;

use backon::{ExponentialBuilder, Retryable};

use crate::config::RetryConfig;
use crate::error::{VerifyError, VerifyResult};

/// Backoff schedule: `min(base * 2^attempt, max_delay)` plus random jitter.
pub fn backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.base_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_retries as usize)
        .with_factor(2.0)
        .with_jitter()
}

/// Run `operation` against `primary`, then each fallback target in turn.
///
/// Retryable errors back off and retry on the same target until
/// `max_retries` is exhausted, then the next target starts with a fresh
/// attempt counter. Terminal errors are returned immediately.
pub async fn execute<T, F, Fut>(
    config: &RetryConfig,
    primary: &str,
    mut operation: F,
) -> VerifyResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = VerifyResult<T>>,
{
    let targets: Vec<String> = std::iter::once(primary.to_string())
        .chain(
            config
                .fallback_targets
                .iter()
                .filter(|t| t.as_str() != primary)
                .cloned(),
        )
        .collect();

    let mut last_error: Option<VerifyError> = None;

    for (index, target) in targets.iter().enumerate() {
        let result = (|| operation(target.clone()))
            .retry(backoff(config))
            .when(|e: &VerifyError| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(
                    "Call to {} failed, retrying in {:?}: {}",
                    target,
                    dur,
                    err
                );
            })
            .await;

        match result {
            Ok(value) => {
                if index > 0 {
                    tracing::info!("Call served by fallback target {}", target);
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!("Retries exhausted on {}: {}", target, err);
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| VerifyError::Internal("no call targets".to_string())))
}
