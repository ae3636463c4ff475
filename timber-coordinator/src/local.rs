//! In-process offset coordination with atomic counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::CoordinatorResult;
use crate::OffsetCoordinator;

/// A map of named atomic counters.
///
/// The map itself is mutex-protected; each counter is a shared atomic so
/// increments after the first lookup are lock-free. Counters start at 0
/// and only ever move forward.
#[derive(Debug, Default)]
pub struct CounterMap {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl CounterMap {
    /// Creates an empty counter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for `key`, creating it at 0 if absent.
    fn counter(&self, key: &str) -> Arc<AtomicU64> {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(counters.entry(key.to_string()).or_default())
    }

    /// Atomically increments the counter for `key` and returns the new value.
    pub fn incr(&self, key: &str) -> u64 {
        self.counter(key).fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Atomically advances the counter for `key` by `amount` and returns
    /// the new value.
    pub fn incr_by(&self, key: &str, amount: u64) -> u64 {
        self.counter(key).fetch_add(amount, Ordering::SeqCst) + amount
    }

    /// Raises the counter for `key` to at least `floor`.
    pub fn raise_to(&self, key: &str, floor: u64) {
        self.counter(key).fetch_max(floor, Ordering::SeqCst);
    }

    /// Returns the current value of the counter for `key` (0 if absent).
    #[must_use]
    pub fn get(&self, key: &str) -> u64 {
        self.counter(key).load(Ordering::SeqCst)
    }
}

/// Offset coordination backed by in-process counters.
///
/// Strictly monotonic within a single process. Offsets restart from the
/// seeded floor after a restart, so the broker seeds counters from the
/// on-disk state when it initializes queues for existing topics.
#[derive(Debug, Default)]
pub struct LocalCoordinator {
    counters: CounterMap,
}

impl LocalCoordinator {
    /// Creates a coordinator with all counters at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OffsetCoordinator for LocalCoordinator {
    async fn next(&self, key: &str) -> CoordinatorResult<u64> {
        Ok(self.counters.incr(key))
    }

    async fn reserve(&self, key: &str, size: u64) -> CoordinatorResult<(u64, u64)> {
        let end = self.counters.incr_by(key, size);
        Ok((end - size, end))
    }

    async fn seed(&self, key: &str, floor: u64) -> CoordinatorResult<()> {
        self.counters.raise_to(key, floor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_starts_at_one() {
        let coordinator = LocalCoordinator::new();
        assert_eq!(coordinator.next("t-0").await.unwrap(), 1);
        assert_eq!(coordinator.next("t-0").await.unwrap(), 2);
        assert_eq!(coordinator.next("t-0").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let coordinator = LocalCoordinator::new();
        assert_eq!(coordinator.next("t-0").await.unwrap(), 1);
        assert_eq!(coordinator.next("t-1").await.unwrap(), 1);
        assert_eq!(coordinator.next("t-0").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reserve_is_contiguous() {
        let coordinator = LocalCoordinator::new();
        assert_eq!(coordinator.reserve("b", 10).await.unwrap(), (0, 10));
        assert_eq!(coordinator.reserve("b", 5).await.unwrap(), (10, 15));
        assert_eq!(coordinator.reserve("b", 1).await.unwrap(), (15, 16));
    }

    #[tokio::test]
    async fn test_seed_raises_floor() {
        let coordinator = LocalCoordinator::new();
        coordinator.seed("t-0", 100).await.unwrap();
        assert_eq!(coordinator.next("t-0").await.unwrap(), 101);

        // Seeding below the current value is a no-op.
        coordinator.seed("t-0", 50).await.unwrap();
        assert_eq!(coordinator.next("t-0").await.unwrap(), 102);
    }

    /// NOTE: Uses multi-threaded runtime to expose race conditions that would
    /// be hidden by single-threaded Tokio's serialization of spawned tasks.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_next_is_dense() {
        let coordinator = Arc::new(LocalCoordinator::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.push(coordinator.next("t-0").await.unwrap());
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        all.sort_unstable();
        let expected: Vec<u64> = (1..=800).collect();
        assert_eq!(all, expected);
    }
}
