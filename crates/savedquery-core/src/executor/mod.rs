//! Query execution.
//!
//! [`QueryExecutor`] is the entry point. It owns the cache and configuration,
//! opens a read session when the caller does not supply one, and hands each
//! call to an evaluator that borrows the session for the whole query tree.
//!
//! Only top-level calls touch the cache. Every entry is tagged with the
//! meta-type and persisted id of the query and of each nested sub-query.

mod combine;
mod count;
mod evaluator;
mod record_match;
mod subquery;
mod values;

pub use combine::IdSet;

use std::sync::Arc;

use tracing::{debug, info};

use savedquery_proto::{MetaTypeId, Query, QueryId, RecordId};

use crate::cache::{
    count_tag, meta_type_tag, query_tag, record_tag, CacheManager, CacheStats, QueryFingerprint,
    ResultCache,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::store::{PathStore, ReadSession, SessionProvider};

use evaluator::Evaluator;

/// Saved-query execution engine.
///
/// Construct once and share; every method takes `&self`.
pub struct QueryExecutor {
    sessions: Arc<dyn SessionProvider>,
    paths: Arc<dyn PathStore>,
    cache: ResultCache,
    config: EngineConfig,
}

impl QueryExecutor {
    /// Create an executor.
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        paths: Arc<dyn PathStore>,
        cache: Arc<dyn CacheManager>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sessions,
            paths,
            cache: ResultCache::new(cache, config.cache_enabled),
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ids of every record `query` matches, sorted.
    ///
    /// Uses `session` when given, otherwise opens one for the duration of the
    /// call. `force_refresh` skips the cache read but still writes back.
    pub async fn execute_query(
        &self,
        query: &Query,
        session: Option<&dyn ReadSession>,
        force_refresh: bool,
    ) -> Result<Vec<RecordId>> {
        let fingerprint = QueryFingerprint::from_query(query);
        let key = fingerprint.as_ref().map(QueryFingerprint::result_key);

        if let (Some(key), false) = (&key, force_refresh) {
            if let Some(ids) = self.cache.get_ids(key).await {
                return Ok(ids);
            }
        }

        let owned: Box<dyn ReadSession>;
        let session = match session {
            Some(session) => session,
            None => {
                owned = self.open_session().await?;
                owned.as_ref()
            }
        };

        let ids: Vec<RecordId> = self
            .evaluator(session)
            .evaluate(query, &[])
            .await?
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default();
        debug!(query_id = ?query.id, matched = ids.len(), "query evaluated");

        if let Some(key) = &key {
            let tags = QueryFingerprint::tags(query);
            self.cache
                .put_ids(key, &ids, &tags, self.config.result_ttl)
                .await;
        }
        Ok(ids)
    }

    /// Whether `record` is in the result of `query`.
    pub async fn check_record_matches_query(
        &self,
        query: &Query,
        record: &RecordId,
        session: Option<&dyn ReadSession>,
        force_refresh: bool,
    ) -> Result<bool> {
        let key = QueryFingerprint::from_query(query).map(|fp| fp.record_key(record));

        if let (Some(key), false) = (&key, force_refresh) {
            if let Some(matched) = self.cache.get_match(key).await {
                return Ok(matched);
            }
        }

        let owned: Box<dyn ReadSession>;
        let session = match session {
            Some(session) => session,
            None => {
                owned = self.open_session().await?;
                owned.as_ref()
            }
        };

        let matched = self
            .evaluator(session)
            .record_matches_query(query, record)
            .await?;
        debug!(query_id = ?query.id, record = %record, matched, "record checked");

        if let Some(key) = &key {
            let mut tags = QueryFingerprint::tags(query);
            tags.push(record_tag(record));
            self.cache
                .put_match(key, matched, &tags, self.config.record_match_ttl)
                .await;
        }
        Ok(matched)
    }

    /// Number of records `query` matches.
    pub async fn count_query_matches(
        &self,
        query: &Query,
        session: Option<&dyn ReadSession>,
        force_refresh: bool,
    ) -> Result<u64> {
        let key = QueryFingerprint::from_query(query).map(|fp| fp.count_key());

        if let (Some(key), false) = (&key, force_refresh) {
            if let Some(count) = self.cache.get_count(key).await {
                return Ok(count);
            }
        }

        let owned: Box<dyn ReadSession>;
        let session = match session {
            Some(session) => session,
            None => {
                owned = self.open_session().await?;
                owned.as_ref()
            }
        };

        let count = self.evaluator(session).count(query).await?;
        debug!(query_id = ?query.id, count, "query counted");

        if let Some(key) = &key {
            let mut tags = QueryFingerprint::tags(query);
            tags.push(count_tag());
            self.cache
                .put_count(key, count, &tags, self.config.count_ttl)
                .await;
        }
        Ok(count)
    }

    /// Drop every cached entry computed over `meta_type`.
    pub async fn invalidate_cache_for_meta_type(&self, meta_type: &MetaTypeId) -> usize {
        let removed = self.cache.invalidate_tag(&meta_type_tag(meta_type)).await;
        info!(meta_type = %meta_type, removed, "invalidated cache for meta-type");
        removed
    }

    /// Drop every cached match check for `record`.
    pub async fn invalidate_cache_for_record(&self, record: &RecordId) -> usize {
        let removed = self.cache.invalidate_tag(&record_tag(record)).await;
        info!(record = %record, removed, "invalidated cache for record");
        removed
    }

    /// Drop every cached entry that depends on persisted query `id`, including
    /// entries of queries that embed it.
    pub async fn invalidate_cache_for_query(&self, id: &QueryId) -> usize {
        let removed = self.cache.invalidate_tag(&query_tag(id)).await;
        info!(query_id = %id, removed, "invalidated cache for query");
        removed
    }

    /// Drop everything.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.cache.clear().await;
        info!(removed, "cleared query cache");
        removed
    }

    /// Cache statistics.
    pub async fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn open_session(&self) -> Result<Box<dyn ReadSession>> {
        self.sessions
            .open()
            .await
            .map_err(|e| Error::Session(e.to_string()))
    }

    fn evaluator<'a>(&'a self, session: &'a dyn ReadSession) -> Evaluator<'a> {
        Evaluator::new(session, self.paths.as_ref(), &self.config)
    }
}
