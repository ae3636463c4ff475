//! Timber Coordinator - strictly monotonic offset assignment.
//!
//! For a given `(topic, partition)` key the coordinator hands out the
//! next logical offset (1-based, gap-free under a single consumer) and
//! reserves cumulative byte ranges. Two interchangeable implementations
//! sit behind one contract:
//!
//! - [`LocalCoordinator`]: in-process atomic counters. Strictly monotonic
//!   within one process; the default for a single-node broker.
//! - [`CasCoordinator`]: compare-and-swap against an external key-value
//!   store implementing [`KvStore`], for multi-node deployments.
//!
//! # Example
//!
//! ```ignore
//! use timber_coordinator::{offset_key, LocalCoordinator, OffsetCoordinator};
//!
//! let coordinator = LocalCoordinator::new();
//! let key = offset_key("orders", 0);
//! let first = coordinator.next(&key).await?;   // 1
//! let second = coordinator.next(&key).await?;  // 2
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod cas;
mod error;
mod kv;
mod local;

use async_trait::async_trait;

pub use cas::{CasCoordinator, RetryConfig};
pub use error::{CoordinatorError, CoordinatorResult};
pub use kv::{KvStore, MemoryKvStore};
pub use local::{CounterMap, LocalCoordinator};

/// Coordinator key for a partition's monotonic offset.
#[must_use]
pub fn offset_key(topic: &str, partition: u32) -> String {
    format!("/offsets/{topic}/{partition}")
}

/// Coordinator key for a partition's cumulative byte position.
#[must_use]
pub fn bytes_key(topic: &str, partition: u32) -> String {
    format!("/offsets/{topic}/{partition}/start/offset")
}

/// Hands out offsets and byte ranges for coordinator keys.
///
/// Implementations must be `Send + Sync`; the broker shares one instance
/// across every partition consumer.
#[async_trait]
pub trait OffsetCoordinator: Send + Sync {
    /// Returns the next offset for `key`: an integer >= 1, strictly
    /// monotonic across all concurrent callers of this instance.
    ///
    /// # Errors
    /// Returns an error if the backing store is unreachable, the stored
    /// value is malformed, or contention exhausts the retry budget.
    async fn next(&self, key: &str) -> CoordinatorResult<u64>;

    /// Reserves `size` bytes at the current cumulative position for `key`.
    ///
    /// Returns `(start, end)` where `start` is the position before the
    /// reservation and `end = start + size`.
    ///
    /// # Errors
    /// Same conditions as [`next`](Self::next).
    async fn reserve(&self, key: &str, size: u64) -> CoordinatorResult<(u64, u64)>;

    /// Raises the counter for `key` to at least `floor`.
    ///
    /// Used at startup to resume counters for partitions with existing
    /// data. A no-op when the counter is already at or past `floor`.
    ///
    /// # Errors
    /// Returns an error if the backing store is unreachable.
    async fn seed(&self, key: &str, floor: u64) -> CoordinatorResult<()>;
}
