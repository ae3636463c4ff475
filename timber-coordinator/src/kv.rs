//! The key-value store contract for distributed coordination.
//!
//! The broker is agnostic about the store behind this trait: anything
//! offering get, put, and an atomic compare-and-swap can coordinate
//! offsets across nodes. [`MemoryKvStore`] implements the contract
//! in-process for tests and single-node deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoordinatorResult;

/// Minimal key-value store contract required by [`CasCoordinator`].
///
/// `expected = None` in [`compare_and_swap`](Self::compare_and_swap)
/// means "the key must be absent", which makes first-offset
/// initialization atomic under concurrent producers.
///
/// [`CasCoordinator`]: crate::CasCoordinator
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> CoordinatorResult<Option<String>>;

    /// Unconditionally sets `key` to `value`.
    async fn put(&self, key: &str, value: &str) -> CoordinatorResult<()>;

    /// Sets `key` to `new` iff its current value equals `expected`.
    ///
    /// Returns whether the swap applied.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> CoordinatorResult<bool>;
}

/// In-memory [`KvStore`] backed by a mutex-protected map.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> CoordinatorResult<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> CoordinatorResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> CoordinatorResult<bool> {
        let mut entries = self.entries.lock().await;
        let current = entries.get(key).map(String::as_str);
        if current == expected {
            entries.insert(key.to_string(), new.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
