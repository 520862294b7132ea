//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use savedquery_core::config::{
    DEFAULT_COUNT_TTL, DEFAULT_FAST_PATH_MAX_VALUES, DEFAULT_MAX_CONCURRENT_SUBQUERIES,
    DEFAULT_RECORD_MATCH_TTL, DEFAULT_RESULT_TTL,
};
use savedquery_core::{CacheConfig, EngineConfig};

use crate::formatter::OutputFormat;

/// Savedquery runner
#[derive(Parser, Debug)]
#[command(name = "savedquery")]
#[command(version, about = "Run saved queries against a JSON fixture")]
pub struct Args {
    /// Fixture file with records, edges, paths and queries
    #[arg(short, long)]
    pub fixture: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Disable result caching
    #[arg(long)]
    pub no_cache: bool,

    /// Full-result cache TTL in seconds
    #[arg(long, default_value_t = DEFAULT_RESULT_TTL.as_secs())]
    pub result_ttl: u64,

    /// Record-match cache TTL in seconds
    #[arg(long, default_value_t = DEFAULT_RECORD_MATCH_TTL.as_secs())]
    pub record_match_ttl: u64,

    /// Count cache TTL in seconds
    #[arg(long, default_value_t = DEFAULT_COUNT_TTL.as_secs())]
    pub count_ttl: u64,

    /// Maximum value clauses for the record and count fast paths
    #[arg(long, default_value_t = DEFAULT_FAST_PATH_MAX_VALUES)]
    pub fast_path_max_values: usize,

    /// Maximum OR sub-queries evaluated at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_SUBQUERIES)]
    pub max_concurrent_subqueries: usize,

    /// Maximum cached entries
    #[arg(long, default_value_t = savedquery_core::cache::DEFAULT_MAX_ENTRIES)]
    pub cache_max_entries: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the ids a saved query matches
    Execute {
        /// Query id
        query: String,
        /// Bypass cached results
        #[arg(long)]
        refresh: bool,
    },
    /// Count the records a saved query matches
    Count {
        /// Query id
        query: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Check whether one record matches a saved query
    Check {
        /// Query id
        query: String,
        /// Record id
        record: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Run every saved query twice and print cache statistics
    Stats,
}

impl Args {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().with_max_entries(self.cache_max_entries)
    }
}

impl From<&Args> for EngineConfig {
    fn from(args: &Args) -> Self {
        let config = EngineConfig::new()
            .with_result_ttl(Duration::from_secs(args.result_ttl))
            .with_record_match_ttl(Duration::from_secs(args.record_match_ttl))
            .with_count_ttl(Duration::from_secs(args.count_ttl))
            .with_fast_path_max_values(args.fast_path_max_values)
            .with_max_concurrent_subqueries(args.max_concurrent_subqueries);
        if args.no_cache {
            config.without_cache()
        } else {
            config
        }
    }
}
