//! Concurrency-limited dispatch queue for external calls.
//!
//! At most `max_concurrency` operations run at once, and consecutive
//! dispatches are spaced by at least `min_interval`, regardless of which
//! caller submitted them. Each handle carries a cancellation token: once it
//! fires, queued operations are dropped and in-flight ones are abandoned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::error::{VerifyError, VerifyResult};

struct QueueInner {
    permits: Semaphore,
    max_concurrency: usize,
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

/// Shared dispatch queue handle.
///
/// Clones share the same limits. Use [`DispatchQueue::with_cancellation`]
/// to get a request-scoped handle with its own cancellation token.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
    cancel: CancellationToken,
}

impl DispatchQueue {
    /// Create a queue allowing `max_concurrency` calls in flight, spaced by
    /// at least `min_interval`.
    pub fn new(max_concurrency: usize, min_interval: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner: Arc::new(QueueInner {
                permits: Semaphore::new(max_concurrency),
                max_concurrency,
                min_interval,
                next_slot: Mutex::new(Instant::now()),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a queue from configuration.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(
            config.max_concurrency,
            Duration::from_millis(config.min_interval_ms),
        )
    }

    /// Handle sharing this queue's limits but bound to `token`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: self.inner.clone(),
            cancel: token,
        }
    }

    /// Cancellation token of this handle.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Maximum number of operations in flight.
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.max_concurrency - self.inner.permits.available_permits()
    }

    /// Wait for a slot, then run `operation`.
    ///
    /// Returns [`VerifyError::Cancelled`] if the token fires while the
    /// operation is queued or running; a running operation is dropped, not
    /// awaited.
    pub async fn dispatch<T, Fut>(&self, operation: Fut) -> VerifyResult<T>
    where
        Fut: Future<Output = VerifyResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(VerifyError::Cancelled);
        }

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(VerifyError::Cancelled),
            permit = self.inner.permits.acquire() => permit
                .map_err(|_| VerifyError::Internal("dispatch queue closed".to_string()))?,
        };

        let slot = {
            let mut next = self.inner.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.inner.min_interval;
            slot
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(VerifyError::Cancelled),
            _ = tokio::time::sleep_until(slot) => {}
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VerifyError::Cancelled),
            result = operation => result,
        }
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("max_concurrency", &self.inner.max_concurrency)
            .field("min_interval", &self.inner.min_interval)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_limits_concurrency() {
        let queue = DispatchQueue::new(2, Duration::ZERO);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .dispatch(async {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, VerifyError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_spaces_dispatches() {
        let queue = DispatchQueue::new(8, Duration::from_millis(30));
        let started = Instant::now();

        let calls = (0..3).map(|i| queue.dispatch(async move { Ok::<_, VerifyError>(i) }));
        let results = futures::future::join_all(calls).await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
        // Third dispatch waits for two intervals.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_cancellation_drops_queued_and_in_flight() {
        let token = CancellationToken::new();
        let queue = DispatchQueue::new(1, Duration::ZERO).with_cancellation(token.clone());

        let running = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .dispatch(async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok::<_, VerifyError>("finished")
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let queued = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dispatch(async { Ok::<_, VerifyError>("queued") }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        token.cancel();

        assert!(running.await.unwrap().unwrap_err().is_cancelled());
        assert!(queued.await.unwrap().unwrap_err().is_cancelled());
        assert!(queue
            .dispatch(async { Ok::<_, VerifyError>(()) })
            .await
            .unwrap_err()
            .is_cancelled());
    }

    #[tokio::test]
    async fn test_scoped_handles_share_limits() {
        let shared = DispatchQueue::new(3, Duration::ZERO);
        let scoped = shared.with_cancellation(CancellationToken::new());
        assert_eq!(scoped.max_concurrency(), 3);

        scoped.cancellation().cancel();
        assert!(!shared.cancellation().is_cancelled());
        assert!(shared.dispatch(async { Ok::<_, VerifyError>(1) }).await.is_ok());
    }
}
