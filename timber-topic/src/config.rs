//! Topic configuration documents.

use serde::{Deserialize, Serialize};

/// The only partition strategy the broker implements.
pub const HASH_STRATEGY: &str = "hash";

fn default_strategy() -> String {
    HASH_STRATEGY.to_string()
}

/// Configuration persisted beside a topic's data as `<name>.json`.
///
/// `compression`, `data_type`, and `replicas` are stored and echoed back
/// but not acted on by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Compression tag (stored, not enforced).
    #[serde(default)]
    pub compression: String,
    /// Data-type tag (stored, not enforced).
    #[serde(default)]
    pub data_type: String,
    /// Replica count (stored, not enforced).
    #[serde(default)]
    pub replicas: u32,
    /// Number of partitions; must be >= 1.
    pub num_partitions: u32,
    /// Partition strategy; always [`HASH_STRATEGY`].
    #[serde(default = "default_strategy")]
    pub partition_strategy: String,
}

impl TopicConfig {
    /// Creates a hash-partitioned configuration with `num_partitions`
    /// partitions and empty tags.
    #[must_use]
    pub fn new(num_partitions: u32) -> Self {
        Self {
            compression: String::new(),
            data_type: String::new(),
            replicas: 0,
            num_partitions,
            partition_strategy: default_strategy(),
        }
    }

    /// Sets the compression tag.
    #[must_use]
    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = compression.into();
        self
    }

    /// Sets the data-type tag.
    #[must_use]
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Sets the replica count.
    #[must_use]
    pub const fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }
}

/// Legacy per-partition offset document, `meta/<name>-<i>.json`.
///
/// Written once at topic creation for layout compatibility and never
/// updated: the offset coordinator is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    /// Last known offset; always 0 in the document written at creation.
    #[serde(rename = "Offset")]
    pub offset: u64,
}
