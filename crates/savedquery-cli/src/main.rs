//! Savedquery Command-Line Runner
//!
//! Loads a JSON fixture into the in-memory store and runs saved queries
//! through the engine.

mod config;
mod fixture;
mod formatter;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use savedquery_core::{EngineConfig, MemoryCacheManager, QueryExecutor};
use savedquery_proto::RecordId;

use config::{Args, Command};
use fixture::Fixture;
use formatter::{format_count, format_ids, format_match, format_stats};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so results on stdout stay machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "savedquery=info,savedquery_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = EngineConfig::from(&args);
    tracing::info!(
        fixture = %args.fixture.display(),
        cache_enabled = config.cache_enabled,
        "configuration loaded"
    );

    let fixture = Fixture::load(&args.fixture)?;
    let store = fixture.build_store();
    let executor = QueryExecutor::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(MemoryCacheManager::new(args.cache_config())),
        config,
    );

    let output = run(&args, &fixture, &executor).await?;
    println!("{}", output);

    tracing::info!(statements = store.statements_executed(), "done");
    Ok(())
}

async fn run(args: &Args, fixture: &Fixture, executor: &QueryExecutor) -> Result<String> {
    match &args.command {
        Command::Execute { query, refresh } => {
            let saved = fixture.query(query)?;
            let ids = executor.execute_query(saved, None, *refresh).await?;
            Ok(format_ids(args.format, query, &ids))
        }
        Command::Count { query, refresh } => {
            let saved = fixture.query(query)?;
            let count = executor.count_query_matches(saved, None, *refresh).await?;
            Ok(format_count(args.format, query, count))
        }
        Command::Check {
            query,
            record,
            refresh,
        } => {
            let saved = fixture.query(query)?;
            let matched = executor
                .check_record_matches_query(saved, &RecordId::from(record.as_str()), None, *refresh)
                .await?;
            Ok(format_match(args.format, query, record, matched))
        }
        Command::Stats => {
            for saved in &fixture.queries {
                for _ in 0..2 {
                    executor.execute_query(saved, None, false).await?;
                }
            }
            Ok(format_stats(args.format, &executor.get_cache_stats().await))
        }
    }
}
