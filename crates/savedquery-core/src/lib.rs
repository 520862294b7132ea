//! Savedquery Core - Saved-query execution engine.
//!
//! Evaluates composable [`Query`](savedquery_proto::Query) definitions against
//! a hybrid store of records and labelled edges. Each value clause is turned
//! into a parameterized statement using one of three strategies, partial
//! results are combined under AND/OR and include/exclude polarity, and results
//! are cached with tag-based invalidation.
//!
//! [`QueryExecutor`] is the entry point. The store, path metadata and cache are
//! consumed through the traits in [`store`] and [`cache`];
//! [`MemoryStore`] and [`MemoryCacheManager`] are in-process implementations.

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod statement;
pub mod store;
pub mod strategy;

pub use cache::{CacheConfig, CacheError, CacheManager, CacheStats, CachedValue, MemoryCacheManager};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::{IdSet, QueryExecutor};
pub use statement::{Clause, ClauseGroup, Condition, RenderedStatement, Statement, StatementBuilder};
pub use store::{
    Datum, MemorySession, MemoryStore, PathStore, ReadSession, Row, SessionProvider, StoreError,
    StoredRecord,
};
pub use strategy::Strategy;

/// Re-export model types.
pub use savedquery_proto as proto;
