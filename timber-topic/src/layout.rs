//! Path arithmetic for the on-disk topic tree.

use std::path::{Path, PathBuf};

use timber_core::PartitionIndex;

/// Computes every path in a topic's directory tree from the base
/// directory. Pure path arithmetic; nothing here touches the filesystem.
#[derive(Debug, Clone)]
pub struct TopicLayout {
    root: PathBuf,
}

impl TopicLayout {
    /// Creates a layout rooted at `<base_dir>/topics`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: base_dir.into().join("topics"),
        }
    }

    /// The directory containing all topic directories.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<topic>/`.
    #[must_use]
    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root.join(topic)
    }

    /// `<root>/<topic>/index/`.
    #[must_use]
    pub fn index_dir(&self, topic: &str) -> PathBuf {
        self.topic_dir(topic).join("index")
    }

    /// `<root>/<topic>/meta/`.
    #[must_use]
    pub fn meta_dir(&self, topic: &str) -> PathBuf {
        self.topic_dir(topic).join("meta")
    }

    /// `<root>/<topic>/<topic>.json`.
    #[must_use]
    pub fn config_path(&self, topic: &str) -> PathBuf {
        self.topic_dir(topic).join(format!("{topic}.json"))
    }

    /// `<root>/<topic>/<topic>-<i>.log`.
    #[must_use]
    pub fn log_path(&self, topic: &str, partition: PartitionIndex) -> PathBuf {
        self.topic_dir(topic).join(format!("{topic}-{partition}.log"))
    }

    /// `<root>/<topic>/index/<topic>-<i>.index`.
    #[must_use]
    pub fn index_path(&self, topic: &str, partition: PartitionIndex) -> PathBuf {
        self.index_dir(topic)
            .join(format!("{topic}-{partition}.index"))
    }

    /// `<root>/<topic>/meta/<topic>-<i>.json`.
    #[must_use]
    pub fn meta_path(&self, topic: &str, partition: PartitionIndex) -> PathBuf {
        self.meta_dir(topic).join(format!("{topic}-{partition}.json"))
    }
}
