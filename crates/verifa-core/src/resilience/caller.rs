//! Composition of the dispatch queue and retry policy.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::queue::DispatchQueue;
use super::retry;
use crate::config::{DispatchConfig, RetryConfig};
use crate::error::VerifyResult;

/// Every external call goes through a `ResilientCaller`: each attempt is
/// dispatched through the shared queue, and the attempts are driven by the
/// retry policy.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    queue: DispatchQueue,
    retry: RetryConfig,
}

impl ResilientCaller {
    pub fn new(queue: DispatchQueue, retry: RetryConfig) -> Self {
        Self { queue, retry }
    }

    pub fn from_config(dispatch: &DispatchConfig, retry: &RetryConfig) -> Self {
        Self::new(DispatchQueue::from_config(dispatch), retry.clone())
    }

    /// Same queue and cancellation, different retry policy.
    pub fn with_retry(&self, retry: RetryConfig) -> Self {
        Self {
            queue: self.queue.clone(),
            retry,
        }
    }

    /// Same queue and retry policy, bound to a request cancellation token.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            queue: self.queue.with_cancellation(token),
            retry: self.retry.clone(),
        }
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Maximum number of calls this caller lets run at once.
    pub fn max_concurrency(&self) -> usize {
        self.queue.max_concurrency()
    }

    /// Run `operation` under the retry policy, dispatching every attempt
    /// through the queue. `operation` receives the current target.
    ///
    /// Cancellation is terminal: a cancelled attempt is never retried.
    pub async fn execute<T, F, Fut>(&self, primary: &str, mut operation: F) -> VerifyResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = VerifyResult<T>>,
    {
        let queue = &self.queue;
        retry::execute(&self.retry, primary, |target| {
            let attempt = operation(target);
            async move { queue.dispatch(attempt).await }
        })
        .await
    }

    /// Run `operation` once per attempt with no target switching.
    pub async fn call<T, F, Fut>(&self, mut operation: F) -> VerifyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = VerifyResult<T>>,
    {
        let single = RetryConfig {
            fallback_targets: Vec::new(),
            ..self.retry.clone()
        };
        let queue = &self.queue;
        retry::execute(&single, "default", |_| {
            let attempt = operation();
            async move { queue.dispatch(attempt).await }
        })
        .await
    }
}

impl Default for ResilientCaller {
    fn default() -> Self {
        Self::new(DispatchQueue::default(), RetryConfig::default())
    }
}
