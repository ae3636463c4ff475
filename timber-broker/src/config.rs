//! Broker configuration.

use std::path::PathBuf;
use std::time::Duration;

use timber_core::Limits;

/// Configuration for a [`Broker`](crate::Broker).
///
/// Defaults match the write path's tuning: 200-entry writer batches on a
/// 5 ms tick, 10 000-slot partition queues, 10 s config cache, 60 s
/// existence cache.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Directory under which `topics/` lives.
    pub base_dir: PathBuf,
    /// Capacity of each partition queue.
    pub queue_capacity: usize,
    /// Writer flush threshold, in entries per file.
    pub writer_batch_size: usize,
    /// Writer tick interval.
    pub writer_tick: Duration,
    /// Whether writer flushes also fsync. Off by default for throughput;
    /// without it a crash before flush loses buffered entries.
    pub sync_on_flush: bool,
    /// Topic configuration cache TTL.
    pub config_ttl: Duration,
    /// Topic existence cache TTL.
    pub exists_ttl: Duration,
    /// How long `Ack::Offset` produces wait for the assigned offset.
    pub ack_timeout: Duration,
}

impl BrokerConfig {
    /// Creates a configuration with default tuning under `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            queue_capacity: 10_000,
            writer_batch_size: 200,
            writer_tick: Duration::from_millis(5),
            sync_on_flush: false,
            config_ttl: Duration::from_secs(10),
            exists_ttl: Duration::from_secs(60),
            ack_timeout: Duration::from_secs(3),
        }
    }

    /// Sets the partition queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the writer flush threshold.
    #[must_use]
    pub const fn with_writer_batch_size(mut self, batch_size: usize) -> Self {
        self.writer_batch_size = batch_size;
        self
    }

    /// Sets the writer tick interval.
    #[must_use]
    pub const fn with_writer_tick(mut self, tick: Duration) -> Self {
        self.writer_tick = tick;
        self
    }

    /// Enables or disables fsync on writer flush.
    #[must_use]
    pub const fn with_sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }

    /// Validates the configuration against system limits.
    ///
    /// # Errors
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), &'static str> {
        let limits = Limits::new();
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be positive");
        }
        if self.queue_capacity > limits.queue_capacity_max as usize {
            return Err("queue_capacity exceeds the system limit");
        }
        if self.writer_batch_size == 0 {
            return Err("writer_batch_size must be positive");
        }
        if self.writer_batch_size > limits.writer_batch_max as usize {
            return Err("writer_batch_size exceeds the system limit");
        }
        if self.writer_tick.is_zero() {
            return Err("writer_tick must be positive");
        }
        if self.ack_timeout.is_zero() {
            return Err("ack_timeout must be positive");
        }
        Ok(())
    }
}
