//! Error-absorbing view over a [`CacheManager`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use savedquery_proto::RecordId;

use super::{CacheManager, CacheStats, CachedValue};

/// Typed, failure-tolerant access to the result cache.
///
/// Backend errors are logged and treated as a miss (on read) or ignored (on
/// write). When disabled, reads always miss and writes are dropped; explicit
/// invalidation still reaches the backend.
#[derive(Clone)]
pub struct ResultCache {
    manager: Arc<dyn CacheManager>,
    enabled: bool,
}

impl ResultCache {
    pub fn new(manager: Arc<dyn CacheManager>, enabled: bool) -> Self {
        Self { manager, enabled }
    }

    async fn get(&self, key: &str) -> Option<CachedValue> {
        if !self.enabled {
            return None;
        }
        match self.manager.get(key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key = %key, "cache miss");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, computing directly");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: CachedValue, tags: &[String], ttl: Duration) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.manager.set(key, value, tags, ttl).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Cached full result.
    pub async fn get_ids(&self, key: &str) -> Option<Vec<RecordId>> {
        match self.get(key).await? {
            CachedValue::Ids(ids) => Some(ids),
            other => {
                warn!(key = %key, value = ?other, "unexpected cached value for result key");
                None
            }
        }
    }

    pub async fn put_ids(&self, key: &str, ids: &[RecordId], tags: &[String], ttl: Duration) {
        self.put(key, CachedValue::Ids(ids.to_vec()), tags, ttl).await;
    }

    /// Cached record-match outcome.
    pub async fn get_match(&self, key: &str) -> Option<bool> {
        match self.get(key).await? {
            CachedValue::Matches(matched) => Some(matched),
            other => {
                warn!(key = %key, value = ?other, "unexpected cached value for record key");
                None
            }
        }
    }

    pub async fn put_match(&self, key: &str, matched: bool, tags: &[String], ttl: Duration) {
        self.put(key, CachedValue::Matches(matched), tags, ttl).await;
    }

    /// Cached count.
    pub async fn get_count(&self, key: &str) -> Option<u64> {
        match self.get(key).await? {
            CachedValue::Count(count) => Some(count),
            other => {
                warn!(key = %key, value = ?other, "unexpected cached value for count key");
                None
            }
        }
    }

    pub async fn put_count(&self, key: &str, count: u64, tags: &[String], ttl: Duration) {
        self.put(key, CachedValue::Count(count), tags, ttl).await;
    }

    /// Drop every entry tagged `tag`. Returns 0 if the backend fails.
    pub async fn invalidate_tag(&self, tag: &str) -> usize {
        match self.manager.invalidate_by_tags(tag).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(tag = %tag, error = %e, "cache invalidation failed");
                0
            }
        }
    }

    /// Drop everything. Returns 0 if the backend fails.
    pub async fn clear(&self) -> usize {
        match self.manager.clear().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "cache clear failed");
                0
            }
        }
    }

    /// Backend statistics with the engine's enabled flag.
    pub async fn stats(&self) -> CacheStats {
        let stats = match self.manager.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "cache stats unavailable");
                CacheStats::default()
            }
        };
        CacheStats {
            enabled: self.enabled,
            ..stats
        }
    }
}
