use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// In-memory map whose entries go stale a fixed time after they were fetched.
///
/// Stale entries are not evicted; they stay readable through [`TtlCache::stale_keys`]
/// until the caller refetches and overwrites them.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    /// An empty cache.
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it was fetched less than `ttl` before `now`.
    pub fn get_fresh(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| &entry.value)
    }

    /// Stores `value` as fetched at `now`, replacing any previous entry.
    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: now,
            },
        );
    }

    /// Keys with an entry at least `ttl` old.
    pub fn stale_keys(&self, now: Instant) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.fetched_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect()
    }
}
