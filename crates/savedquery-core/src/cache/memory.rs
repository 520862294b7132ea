//! In-process tagged cache.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{CacheError, CacheManager, CacheStats, CachedValue};

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Configuration for [`MemoryCacheManager`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum live entries before eviction.
    pub max_entries: usize,
}

impl CacheConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct CacheEntry {
    value: CachedValue,
    tags: Vec<String>,
    created_at: Instant,
    expires_at: Instant,
    hits: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// DashMap-backed cache with per-entry TTL and a tag index.
///
/// Expired entries are dropped lazily on access or by [`purge_expired`].
/// When full, an expired entry is evicted first, otherwise the entry with the
/// fewest hits (oldest first on ties).
///
/// Writes, invalidations and removals are serialized so an entry is never
/// live without its tag links.
///
/// [`purge_expired`]: MemoryCacheManager::purge_expired
pub struct MemoryCacheManager {
    entries: DashMap<String, CacheEntry>,
    tags: DashMap<String, HashSet<String>>,
    writes: Mutex<()>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl MemoryCacheManager {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            tags: DashMap::new(),
            writes: Mutex::new(()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let _writes = self.writes.lock();
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        expired.iter().filter(|key| self.remove_entry(key)).count()
    }

    /// Remove one entry and unlink it from its tags.
    fn remove_entry(&self, key: &str) -> bool {
        let Some((_, entry)) = self.entries.remove(key) else {
            return false;
        };
        for tag in &entry.tags {
            if let Some(mut keys) = self.tags.get_mut(tag) {
                keys.remove(key);
            }
            self.tags.remove_if(tag, |_, keys| keys.is_empty());
        }
        true
    }

    fn evict_one(&self) {
        let now = Instant::now();
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| {
                let entry = e.value();
                (
                    !entry.is_expired(now),
                    entry.hits.load(AtomicOrdering::Relaxed),
                    entry.created_at,
                )
            })
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            if self.remove_entry(&key) {
                self.evictions.fetch_add(1, AtomicOrdering::Relaxed);
                tracing::debug!(key = %key, "evicted cache entry");
            }
        }
    }
}

impl Default for MemoryCacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl CacheManager for MemoryCacheManager {
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hits.fetch_add(1, AtomicOrdering::Relaxed);
                self.hits.fetch_add(1, AtomicOrdering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let _writes = self.writes.lock();
            // A concurrent set may have replaced it since.
            if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
                self.remove_entry(key);
            }
        }
        self.misses.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: CachedValue,
        tags: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let _writes = self.writes.lock();

        // Replacing drops the old tag links first.
        let replaced = self.remove_entry(key);
        if !replaced && self.entries.len() >= self.config.max_entries {
            self.evict_one();
        }

        let now = Instant::now();
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                tags: tags.clone(),
                created_at: now,
                expires_at: now + ttl,
                hits: AtomicU64::new(0),
            },
        );
        for tag in tags {
            self.tags.entry(tag).or_default().insert(key.to_string());
        }
        self.sets.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    async fn invalidate_by_tags(&self, tag: &str) -> Result<usize, CacheError> {
        let _writes = self.writes.lock();
        let keys = self
            .tags
            .remove(tag)
            .map(|(_, keys)| keys)
            .unwrap_or_default();
        let removed = keys.iter().filter(|key| self.remove_entry(key)).count();
        self.invalidations
            .fetch_add(removed as u64, AtomicOrdering::Relaxed);
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let _writes = self.writes.lock();
        let removed = self.entries.len();
        self.entries.clear();
        self.tags.clear();
        self.invalidations
            .fetch_add(removed as u64, AtomicOrdering::Relaxed);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            enabled: true,
            entries: self.entries.len(),
            tags: self.tags.len(),
            hits: self.hits.load(AtomicOrdering::Relaxed),
            misses: self.misses.load(AtomicOrdering::Relaxed),
            sets: self.sets.load(AtomicOrdering::Relaxed),
            evictions: self.evictions.load(AtomicOrdering::Relaxed),
            invalidations: self.invalidations.load(AtomicOrdering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savedquery_proto::RecordId;

    const TTL: Duration = Duration::from_secs(60);

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|t| t.to_string()).collect()
    }

    fn ids(values: &[&str]) -> CachedValue {
        CachedValue::Ids(values.iter().map(|v| RecordId::from(*v)).collect())
    }

    #[tokio::test]
    async fn test_cache_hit_miss() {
        let cache = MemoryCacheManager::default();
        assert!(cache.get("k").await.unwrap().is_none());

        cache.set("k", ids(&["a"]), &tags(&["t"]), TTL).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(ids(&["a"])));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.tags, 1);
    }

    #[tokio::test]
    async fn test_cache_expiration() {
        let cache = MemoryCacheManager::default();
        cache
            .set("k", CachedValue::Count(3), &[], Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCacheManager::default();
        cache
            .set("old", CachedValue::Count(1), &tags(&["t"]), Duration::ZERO)
            .await
            .unwrap();
        cache
            .set("new", CachedValue::Count(2), &tags(&["t"]), TTL)
            .await
            .unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().await.unwrap().tags, 1);
    }

    #[tokio::test]
    async fn test_tag_invalidation_is_scoped() {
        let cache = MemoryCacheManager::default();
        cache
            .set("a", ids(&["1"]), &tags(&["meta_type:user", "record:r1"]), TTL)
            .await
            .unwrap();
        cache
            .set("b", ids(&["2"]), &tags(&["meta_type:user"]), TTL)
            .await
            .unwrap();
        cache
            .set("c", ids(&["3"]), &tags(&["meta_type:order"]), TTL)
            .await
            .unwrap();

        assert_eq!(cache.invalidate_by_tags("record:r1").await.unwrap(), 1);
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_some());

        assert_eq!(cache.invalidate_by_tags("meta_type:user").await.unwrap(), 1);
        assert!(cache.get("c").await.unwrap().is_some());
        assert_eq!(cache.invalidate_by_tags("meta_type:user").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replacing_entry_updates_tags() {
        let cache = MemoryCacheManager::default();
        cache.set("k", ids(&["1"]), &tags(&["old"]), TTL).await.unwrap();
        cache.set("k", ids(&["2"]), &tags(&["new"]), TTL).await.unwrap();

        assert_eq!(cache.invalidate_by_tags("old").await.unwrap(), 0);
        assert_eq!(cache.get("k").await.unwrap(), Some(ids(&["2"])));
        assert_eq!(cache.invalidate_by_tags("new").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_eviction_prefers_least_hit() {
        let cache = MemoryCacheManager::new(CacheConfig::new().with_max_entries(2));
        cache.set("a", CachedValue::Count(1), &[], TTL).await.unwrap();
        cache.set("b", CachedValue::Count(2), &[], TTL).await.unwrap();
        cache.get("b").await.unwrap();
        cache.get("b").await.unwrap();

        cache.set("c", CachedValue::Count(3), &[], TTL).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_some());
        assert_eq!(cache.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_and_invalidate_keep_tags_linked() {
        let cache = std::sync::Arc::new(MemoryCacheManager::default());

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let key = format!("k{}", i % 20);
                    cache.set(&key, CachedValue::Count(i), &tags(&["t"]), TTL).await.unwrap();
                }
            })
        };
        let invalidator = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    cache.invalidate_by_tags("t").await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };
        writer.await.unwrap();
        invalidator.await.unwrap();

        // Every surviving entry is still reachable through its tag.
        let live = cache.len();
        assert_eq!(cache.invalidate_by_tags("t").await.unwrap(), live);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().await.unwrap().tags, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCacheManager::default();
        cache.set("a", CachedValue::Matches(true), &tags(&["t"]), TTL).await.unwrap();
        cache.set("b", CachedValue::Matches(false), &tags(&["t"]), TTL).await.unwrap();
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().await.unwrap().tags, 0);
    }
}
