//! Time-bounded caching for filesystem lookups.
//!
//! Caching topic existence and configuration reduces the per-produce cost
//! to a map lookup on the hot path. Time is passed in explicitly so
//! expiry is deterministic under test.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// An entry in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    updated_at: Instant,
}

/// A map whose entries expire a fixed duration after insertion.
///
/// Entries are immutable while cached and replaced atomically on refresh.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value for `key` if present and not expired.
    ///
    /// The TTL boundary is inclusive: an entry exactly `ttl` old is still
    /// valid.
    #[must_use]
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        self.entries.get(key).and_then(|entry| {
            let age = now.saturating_duration_since(entry.updated_at);
            (age <= self.ttl).then(|| entry.value.clone())
        })
    }

    /// Inserts or replaces the value for `key`.
    pub fn put(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                updated_at: now,
            },
        );
    }

    /// Removes the entry for `key`, if any.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Removes every expired entry.
    pub fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.updated_at) <= ttl);
    }

    /// Returns the number of entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let now = Instant::now();

        cache.put("topic", 4u32, now);
        assert_eq!(cache.get(&"topic", now), Some(4));
    }

    #[test]
    fn test_expiry() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.put("topic", 4u32, now);

        // Valid at the TTL boundary.
        assert_eq!(cache.get(&"topic", now + Duration::from_secs(10)), Some(4));
        // Expired past it.
        assert_eq!(cache.get(&"topic", now + Duration::from_secs(11)), None);
    }

    #[test]
    fn test_replace_resets_age() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.put("topic", 1u32, now);

        let later = now + Duration::from_secs(8);
        cache.put("topic", 2u32, later);

        assert_eq!(cache.get(&"topic", later + Duration::from_secs(9)), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.put("topic", 1u32, now);

        cache.invalidate(&"topic");
        assert_eq!(cache.get(&"topic", now), None);
    }

    #[test]
    fn test_evict_expired() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let now = Instant::now();
        cache.put("old", 1u32, now);
        cache.put("new", 2u32, now + Duration::from_secs(8));

        cache.evict_expired(now + Duration::from_secs(12));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&"new", now + Duration::from_secs(12)).is_some());
    }
}
