//! Engine configuration.

use std::time::Duration;

/// Default TTL for full query results (5 minutes).
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(300);

/// Default TTL for single-record match checks.
pub const DEFAULT_RECORD_MATCH_TTL: Duration = Duration::from_secs(60);

/// Default TTL for counts.
pub const DEFAULT_COUNT_TTL: Duration = Duration::from_secs(300);

/// Largest number of value clauses the record-match and count fast paths accept.
pub const DEFAULT_FAST_PATH_MAX_VALUES: usize = 5;

/// Default cap on concurrently evaluated OR sub-queries.
pub const DEFAULT_MAX_CONCURRENT_SUBQUERIES: usize = 16;

/// Configuration owned by a `QueryExecutor`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether results are read from and written to the cache.
    pub cache_enabled: bool,

    /// TTL for full-result entries.
    pub result_ttl: Duration,

    /// TTL for record-match entries.
    pub record_match_ttl: Duration,

    /// TTL for count entries.
    pub count_ttl: Duration,

    /// Value-clause ceiling for the record-match and count fast paths.
    pub fast_path_max_values: usize,

    /// How many OR sub-queries run at once.
    pub max_concurrent_subqueries: usize,
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            cache_enabled: true,
            result_ttl: DEFAULT_RESULT_TTL,
            record_match_ttl: DEFAULT_RECORD_MATCH_TTL,
            count_ttl: DEFAULT_COUNT_TTL,
            fast_path_max_values: DEFAULT_FAST_PATH_MAX_VALUES,
            max_concurrent_subqueries: DEFAULT_MAX_CONCURRENT_SUBQUERIES,
        }
    }

    /// Disable result caching.
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Set the full-result TTL.
    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Set the record-match TTL.
    pub fn with_record_match_ttl(mut self, ttl: Duration) -> Self {
        self.record_match_ttl = ttl;
        self
    }

    /// Set the count TTL.
    pub fn with_count_ttl(mut self, ttl: Duration) -> Self {
        self.count_ttl = ttl;
        self
    }

    /// Set the fast-path value ceiling.
    pub fn with_fast_path_max_values(mut self, max: usize) -> Self {
        self.fast_path_max_values = max;
        self
    }

    /// Set the OR sub-query concurrency.
    pub fn with_max_concurrent_subqueries(mut self, max: usize) -> Self {
        self.max_concurrent_subqueries = max.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.cache_enabled);
        assert_eq!(config.result_ttl, DEFAULT_RESULT_TTL);
        assert_eq!(config.record_match_ttl, DEFAULT_RECORD_MATCH_TTL);
        assert_eq!(config.fast_path_max_values, 5);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .without_cache()
            .with_result_ttl(Duration::from_secs(10))
            .with_count_ttl(Duration::from_secs(20))
            .with_fast_path_max_values(2)
            .with_max_concurrent_subqueries(0);

        assert!(!config.cache_enabled);
        assert_eq!(config.result_ttl, Duration::from_secs(10));
        assert_eq!(config.count_ttl, Duration::from_secs(20));
        assert_eq!(config.fast_path_max_values, 2);
        assert_eq!(config.max_concurrent_subqueries, 1);
    }
}
