//! Bounded in-memory caches with optional TTL.
//!
//! Each cache is an explicit object injected into the component that owns
//! it (prober decorator, oracle adapters, splice orchestrator), so every
//! instance is bounded and expired independently.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed: Instant,
}

/// Thread-safe cache with least-recently-accessed eviction.
///
/// Entries expire `ttl` after insertion (reads do not extend their life).
/// With `ttl = None` entries live until evicted for capacity.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `max_entries` values.
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Cache whose entries never expire.
    pub fn unbounded_ttl(max_entries: usize) -> Self {
        Self::new(max_entries, None)
    }

    /// Convenience for configs where `0` means "no expiry".
    pub fn with_ttl_secs(max_entries: usize, ttl_secs: u64) -> Self {
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        Self::new(max_entries, ttl)
    }

    /// Get a live value, refreshing its recency.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entry = self.entries.get_mut(key)?;
        if self.is_expired(&entry) {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(entry.value.clone())
    }

    /// Insert or overwrite a value (last writer wins).
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cleanup_expired();
            if self.entries.len() >= self.max_entries {
                self.evict_oldest();
            }
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_accessed: now,
            },
        );
    }

    /// Remove an entry from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get the number of cached entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.entries.len();
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
        before.saturating_sub(self.entries.len())
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_accessed)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// Something the periodic sweeper can expire.
pub trait Expiring: Send + Sync {
    fn cleanup_expired(&self) -> usize;
}

impl<K, V> Expiring for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn cleanup_expired(&self) -> usize {
        TtlCache::cleanup_expired(self)
    }
}

/// Periodically sweep expired entries out of `caches`.
pub fn spawn_cleanup(
    caches: Vec<Arc<dyn Expiring>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed: usize = caches.iter().map(|c| c.cleanup_expired()).sum();
            if removed > 0 {
                tracing::debug!(removed, "Expired cache entries swept");
            }
        }
    })
}
