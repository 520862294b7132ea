//! Tagged result caching.
//!
//! Results are cached under keys derived from query structure (see
//! [`QueryFingerprint`]) and tagged so that whole groups of entries can be
//! dropped at once: by meta-type, by record, by query id, or all of them.
//!
//! The engine only depends on the [`CacheManager`] contract.
//! [`MemoryCacheManager`] is the in-process implementation.

mod fingerprint;
mod layer;
mod memory;

pub use fingerprint::{count_tag, meta_type_tag, query_tag, record_tag, QueryFingerprint};
pub use layer::ResultCache;
pub use memory::{CacheConfig, MemoryCacheManager, DEFAULT_MAX_ENTRIES};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use savedquery_proto::RecordId;

/// Cache subsystem failures.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backend could not be reached or refused the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A value could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// A cached evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachedValue {
    /// Matching record ids, sorted.
    Ids(Vec<RecordId>),
    /// Whether one record matched.
    Matches(bool),
    /// Number of matching records.
    Count(u64),
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Whether the engine reads and writes the cache.
    pub enabled: bool,
    /// Live entries.
    pub entries: usize,
    /// Distinct tags currently indexed.
    pub tags: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    /// Entries removed through tag invalidation or clearing.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits as f64;
        let total = hits + self.misses as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Tagged cache contract.
#[async_trait]
pub trait CacheManager: Send + Sync {
    /// Look up a live entry.
    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError>;

    /// Store an entry under `key`, replacing any previous one.
    async fn set(
        &self,
        key: &str,
        value: CachedValue,
        tags: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop every entry carrying `tag`. Returns how many were dropped.
    async fn invalidate_by_tags(&self, tag: &str) -> Result<usize, CacheError>;

    /// Drop everything. Returns how many entries were dropped.
    async fn clear(&self) -> Result<usize, CacheError>;

    /// Current statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 2,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.666).abs() < 0.01);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
