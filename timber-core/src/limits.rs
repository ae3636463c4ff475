//! System limits and configuration bounds.
//!
//! Put limits on everything: every queue, buffer, and resource has an
//! explicit maximum size so the system stays predictable under load.

/// System-wide limits for the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum serialized payload size in bytes.
    pub payload_size_bytes_max: u32,
    /// Maximum length of a topic name in bytes.
    pub topic_name_len_max: u32,
    /// Maximum number of partitions per topic.
    pub partitions_per_topic_max: u32,
    /// Maximum capacity of a partition queue.
    pub queue_capacity_max: u32,
    /// Maximum writer batch size (entries per file per flush).
    pub writer_batch_max: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // 1MB payloads; topic names fit a directory entry.
            payload_size_bytes_max: 1024 * 1024,
            topic_name_len_max: 128,
            partitions_per_topic_max: 1024,
            queue_capacity_max: 1_000_000,
            writer_batch_max: 100_000,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns a description of the first invalid limit.
    pub const fn validate(&self) -> Result<(), &'static str> {
        if self.payload_size_bytes_max == 0 {
            return Err("payload_size_bytes_max must be positive");
        }
        if self.topic_name_len_max == 0 {
            return Err("topic_name_len_max must be positive");
        }
        if self.partitions_per_topic_max == 0 {
            return Err("partitions_per_topic_max must be positive");
        }
        if self.queue_capacity_max == 0 {
            return Err("queue_capacity_max must be positive");
        }
        if self.writer_batch_max == 0 {
            return Err("writer_batch_max must be positive");
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
