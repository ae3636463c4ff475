//! Compare-and-swap offset coordination over an external store.
//!
//! Each assignment reads the current value and attempts an atomic swap to
//! the incremented value. Losing a race costs one retry after a short
//! backoff; exhausting the retry budget surfaces a conflict. Every store
//! round-trip is bounded by a per-attempt timeout.
//!
//! Crashes between the swap and the log append can leave the stored
//! counter ahead of the log. Multi-node deployments tolerate the
//! resulting offset gaps; single-node brokers use the local coordinator,
//! which does not exhibit them.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::kv::KvStore;
use crate::OffsetCoordinator;

/// Retry policy for contested compare-and-swap loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts per assignment.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
    /// Deadline for each store round-trip.
    pub op_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(10),
            op_timeout: Duration::from_secs(3),
        }
    }
}

/// Offset coordination through an external key-value store.
///
/// Correct under contention from any number of nodes; see the module
/// docs for the crash-consistency caveat.
#[derive(Debug)]
pub struct CasCoordinator<S> {
    store: S,
    retry: RetryConfig,
}

impl<S: KvStore> CasCoordinator<S> {
    /// Creates a coordinator over `store` with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry(store, RetryConfig::default())
    }

    /// Creates a coordinator with a custom retry policy.
    pub fn with_retry(store: S, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// One bounded store round-trip.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl std::future::Future<Output = CoordinatorResult<T>> + Send,
    ) -> CoordinatorResult<T> {
        match timeout(self.retry.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoordinatorError::Timeout {
                operation,
                waited_ms: self.retry.op_timeout.as_millis() as u64,
            }),
        }
    }

    /// Reads the current integer value at `key`, if any.
    async fn current(&self, key: &str) -> CoordinatorResult<Option<u64>> {
        let raw = self.bounded("get", self.store.get(key)).await?;
        match raw {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| CoordinatorError::Malformed {
                    key: key.to_string(),
                    value,
                }),
        }
    }

    /// CAS loop advancing the counter at `key` by `step`.
    ///
    /// Returns `(previous, new)` where `previous` is 0 when the key was
    /// absent.
    async fn advance(&self, key: &str, step: u64) -> CoordinatorResult<(u64, u64)> {
        for attempt in 1..=self.retry.attempts {
            let (expected, previous) = match self.current(key).await? {
                None => (None, 0),
                Some(value) => (Some(value.to_string()), value),
            };
            let new = previous + step;

            let swapped = self
                .bounded(
                    "compare_and_swap",
                    self.store
                        .compare_and_swap(key, expected.as_deref(), &new.to_string()),
                )
                .await?;

            if swapped {
                debug!(key, previous, new, attempt, "advanced coordinator counter");
                return Ok((previous, new));
            }

            warn!(key, attempt, "compare-and-swap lost race, retrying");
            tokio::time::sleep(self.retry.backoff).await;
        }

        Err(CoordinatorError::Conflict {
            key: key.to_string(),
            attempts: self.retry.attempts,
        })
    }
}

#[async_trait]
impl<S: KvStore> OffsetCoordinator for CasCoordinator<S> {
    async fn next(&self, key: &str) -> CoordinatorResult<u64> {
        let (_, new) = self.advance(key, 1).await?;
        Ok(new)
    }

    async fn reserve(&self, key: &str, size: u64) -> CoordinatorResult<(u64, u64)> {
        self.advance(key, size).await
    }

    async fn seed(&self, key: &str, floor: u64) -> CoordinatorResult<()> {
        // Only initializes an absent key; a live store already holds the
        // authoritative value.
        let _ = self
            .bounded(
                "compare_and_swap",
                self.store.compare_and_swap(key, None, &floor.to_string()),
            )
            .await?;
        Ok(())
    }
}
