//! Topic creation and cached lookups.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use timber_core::{Limits, PartitionIndex, INDEX_HEADER};
use tokio::fs;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::config::{PartitionMeta, TopicConfig};
use crate::error::{TopicError, TopicResult};
use crate::layout::TopicLayout;

/// Cache tuning for the topic manager.
#[derive(Debug, Clone, Copy)]
pub struct TopicManagerConfig {
    /// How long a loaded configuration stays cached.
    pub config_ttl: Duration,
    /// How long a directory-existence check stays cached.
    pub exists_ttl: Duration,
}

impl Default for TopicManagerConfig {
    fn default() -> Self {
        Self {
            config_ttl: Duration::from_secs(10),
            exists_ttl: Duration::from_secs(60),
        }
    }
}

/// Owns topic directory creation, the configuration document, and the
/// lookup caches in front of the filesystem.
#[derive(Debug)]
pub struct TopicManager {
    layout: TopicLayout,
    limits: Limits,
    /// Serializes creations so concurrent creates of one name race on
    /// the existence check at most once.
    create_lock: tokio::sync::Mutex<()>,
    config_cache: Mutex<TtlCache<String, Arc<TopicConfig>>>,
    exists_cache: Mutex<TtlCache<String, bool>>,
}

impl TopicManager {
    /// Creates a manager over `layout` with the given cache tuning.
    #[must_use]
    pub fn new(layout: TopicLayout, config: TopicManagerConfig) -> Self {
        Self {
            layout,
            limits: Limits::new(),
            create_lock: tokio::sync::Mutex::new(()),
            config_cache: Mutex::new(TtlCache::new(config.config_ttl)),
            exists_cache: Mutex::new(TtlCache::new(config.exists_ttl)),
        }
    }

    /// Returns the layout this manager creates topics under.
    #[must_use]
    pub fn layout(&self) -> &TopicLayout {
        &self.layout
    }

    /// Creates a topic's directory tree and persists its configuration.
    ///
    /// Creates `<topic>/`, `<topic>/index/`, and `<topic>/meta/`; per
    /// partition an empty log file, an index file holding only the header
    /// line, and the legacy meta document; finally the pretty-printed
    /// configuration. A filesystem failure mid-sequence may leave partial
    /// state on disk; recovery is a manual concern.
    ///
    /// # Errors
    /// - [`TopicError::InvalidName`] for empty or unsafe names
    /// - [`TopicError::InvalidConfig`] for a zero partition count
    /// - [`TopicError::AlreadyExists`] if the topic directory exists
    /// - [`TopicError::Io`] for filesystem failures
    pub async fn create_topic(&self, name: &str, config: &TopicConfig) -> TopicResult<()> {
        self.validate_name(name)?;

        if config.num_partitions < 1 {
            return Err(TopicError::InvalidConfig {
                message: "number of partitions must be at least 1".to_string(),
            });
        }
        if config.num_partitions > self.limits.partitions_per_topic_max {
            return Err(TopicError::InvalidConfig {
                message: format!(
                    "number of partitions {} exceeds maximum {}",
                    config.num_partitions, self.limits.partitions_per_topic_max
                ),
            });
        }

        let _guard = self.create_lock.lock().await;

        let topic_dir = self.layout.topic_dir(name);
        if path_exists(&topic_dir).await {
            return Err(TopicError::AlreadyExists {
                topic: name.to_string(),
            });
        }

        for dir in [
            topic_dir.clone(),
            self.layout.index_dir(name),
            self.layout.meta_dir(name),
        ] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| TopicError::io("create_dir", &dir, &e))?;
        }

        let meta = serde_json::to_string_pretty(&PartitionMeta { offset: 0 })
            .map_err(|e| TopicError::ConfigMalformed {
                topic: name.to_string(),
                message: e.to_string(),
            })?;

        for i in 0..config.num_partitions {
            let partition = PartitionIndex::new(i);

            let log_path = self.layout.log_path(name, partition);
            fs::write(&log_path, b"")
                .await
                .map_err(|e| TopicError::io("create_log", &log_path, &e))?;

            let index_path = self.layout.index_path(name, partition);
            fs::write(&index_path, INDEX_HEADER)
                .await
                .map_err(|e| TopicError::io("create_index", &index_path, &e))?;

            let meta_path = self.layout.meta_path(name, partition);
            fs::write(&meta_path, &meta)
                .await
                .map_err(|e| TopicError::io("create_meta", &meta_path, &e))?;
        }

        let document = serde_json::to_string_pretty(config).map_err(|e| {
            TopicError::ConfigMalformed {
                topic: name.to_string(),
                message: e.to_string(),
            }
        })?;
        let config_path = self.layout.config_path(name);
        fs::write(&config_path, document)
            .await
            .map_err(|e| TopicError::io("write_config", &config_path, &e))?;

        let now = Instant::now();
        lock(&self.exists_cache).put(name.to_string(), true, now);
        lock(&self.config_cache).put(name.to_string(), Arc::new(config.clone()), now);

        info!(
            topic = %name,
            partitions = config.num_partitions,
            strategy = %config.partition_strategy,
            "Created topic"
        );

        Ok(())
    }

    /// Returns whether a directory for `name` exists, cached for the
    /// configured existence TTL.
    pub async fn topic_exists(&self, name: &str) -> bool {
        let now = Instant::now();
        if let Some(exists) = lock(&self.exists_cache).get(&name.to_string(), now) {
            return exists;
        }

        let exists = path_exists(&self.layout.topic_dir(name)).await;
        lock(&self.exists_cache).put(name.to_string(), exists, now);
        exists
    }

    /// Loads a topic's configuration, cached for the configured TTL.
    ///
    /// # Errors
    /// - [`TopicError::ConfigUnavailable`] if the document cannot be read
    /// - [`TopicError::ConfigMalformed`] if it cannot be decoded
    pub async fn load_config(&self, name: &str) -> TopicResult<Arc<TopicConfig>> {
        let now = Instant::now();
        if let Some(config) = lock(&self.config_cache).get(&name.to_string(), now) {
            return Ok(config);
        }

        let path = self.layout.config_path(name);
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| TopicError::ConfigUnavailable {
                topic: name.to_string(),
                message: e.to_string(),
            })?;

        let config: TopicConfig =
            serde_json::from_str(&raw).map_err(|e| TopicError::ConfigMalformed {
                topic: name.to_string(),
                message: e.to_string(),
            })?;

        let config = Arc::new(config);
        lock(&self.config_cache).put(name.to_string(), Arc::clone(&config), now);
        Ok(config)
    }

    /// Lists the names of every topic directory on disk.
    ///
    /// Returns an empty list when the topics root does not exist yet.
    ///
    /// # Errors
    /// Returns [`TopicError::Io`] if the root cannot be enumerated.
    pub async fn list_topics(&self) -> TopicResult<Vec<String>> {
        let root = self.layout.root();
        if !path_exists(root).await {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(root)
            .await
            .map_err(|e| TopicError::io("read_dir", root, &e))?;

        let mut topics = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TopicError::io("read_dir", root, &e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| TopicError::io("stat", entry.path(), &e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => topics.push(name),
                Err(name) => warn!(?name, "skipping topic directory with non-UTF-8 name"),
            }
        }

        topics.sort_unstable();
        Ok(topics)
    }

    fn validate_name(&self, name: &str) -> TopicResult<()> {
        if name.is_empty() {
            return Err(TopicError::InvalidName {
                name: name.to_string(),
                reason: "name must not be empty",
            });
        }
        if name.len() > self.limits.topic_name_len_max as usize {
            return Err(TopicError::InvalidName {
                name: name.to_string(),
                reason: "name is too long",
            });
        }
        let safe = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(TopicError::InvalidName {
                name: name.to_string(),
                reason: "name may only contain ASCII letters, digits, '-' and '_'",
            });
        }
        Ok(())
    }
}

/// Locks a cache, recovering from a poisoned mutex.
fn lock<K, V>(cache: &Mutex<TtlCache<K, V>>) -> std::sync::MutexGuard<'_, TtlCache<K, V>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn path_exists(path: &std::path::Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> TopicManager {
        TopicManager::new(TopicLayout::new(dir.path()), TopicManagerConfig::default())
    }

    #[tokio::test]
    async fn test_create_topic_builds_full_tree() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager
            .create_topic("orders", &TopicConfig::new(3))
            .await
            .unwrap();

        let layout = manager.layout();
        for i in 0..3 {
            let partition = PartitionIndex::new(i);
            let log = std::fs::read(layout.log_path("orders", partition)).unwrap();
            assert!(log.is_empty());

            let index =
                std::fs::read_to_string(layout.index_path("orders", partition)).unwrap();
            assert_eq!(index, INDEX_HEADER);

            let meta =
                std::fs::read_to_string(layout.meta_path("orders", partition)).unwrap();
            let decoded: PartitionMeta = serde_json::from_str(&meta).unwrap();
            assert_eq!(decoded.offset, 0);
        }

        let config = std::fs::read_to_string(layout.config_path("orders")).unwrap();
        let decoded: TopicConfig = serde_json::from_str(&config).unwrap();
        assert_eq!(decoded.num_partitions, 3);
    }

    #[tokio::test]
    async fn test_duplicate_create_fails_and_leaves_tree() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager
            .create_topic("dup", &TopicConfig::new(2))
            .await
            .unwrap();
        let before = std::fs::read_to_string(manager.layout().config_path("dup")).unwrap();

        let err = manager
            .create_topic("dup", &TopicConfig::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TopicError::AlreadyExists { .. }));

        let after = std::fs::read_to_string(manager.layout().config_path("dup")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_zero_partitions_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager
            .create_topic("empty", &TopicConfig::new(0))
            .await
            .unwrap_err();
        assert!(matches!(err, TopicError::InvalidConfig { .. }));
        assert!(!manager.layout().topic_dir("empty").exists());
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let config = TopicConfig::new(1);

        for name in ["", "has space", "../escape", "dot.dot"] {
            let err = manager.create_topic(name, &config).await.unwrap_err();
            assert!(matches!(err, TopicError::InvalidName { .. }), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_topic_exists() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(!manager.topic_exists("ghost").await);
        manager
            .create_topic("real", &TopicConfig::new(1))
            .await
            .unwrap();
        assert!(manager.topic_exists("real").await);
    }

    #[tokio::test]
    async fn test_load_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let config = TopicConfig::new(4).with_data_type("json");
        manager.create_topic("cfg", &config).await.unwrap();

        let loaded = manager.load_config("cfg").await.unwrap();
        assert_eq!(*loaded, config);
    }

    #[tokio::test]
    async fn test_load_config_missing_topic() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let err = manager.load_config("ghost").await.unwrap_err();
        assert!(matches!(err, TopicError::ConfigUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_load_config_malformed_document() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager
            .create_topic("bad", &TopicConfig::new(1))
            .await
            .unwrap();
        std::fs::write(manager.layout().config_path("bad"), "{not json").unwrap();

        // The config written at creation is cached; a fresh manager
        // observes the corrupted document.
        let fresh = TopicManager::new(
            TopicLayout::new(dir.path()),
            TopicManagerConfig::default(),
        );
        let err = fresh.load_config("bad").await.unwrap_err();
        assert!(matches!(err, TopicError::ConfigMalformed { .. }));
    }

    #[tokio::test]
    async fn test_list_topics() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert!(manager.list_topics().await.unwrap().is_empty());

        manager
            .create_topic("beta", &TopicConfig::new(1))
            .await
            .unwrap();
        manager
            .create_topic("alpha", &TopicConfig::new(1))
            .await
            .unwrap();

        assert_eq!(manager.list_topics().await.unwrap(), vec!["alpha", "beta"]);
    }
}
