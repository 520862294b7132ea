//! Output formatting.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::json;

use savedquery_core::CacheStats;
use savedquery_proto::RecordId;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Matching ids of one query.
pub fn format_ids(format: OutputFormat, query: &str, ids: &[RecordId]) -> String {
    match format {
        OutputFormat::Table => {
            if ids.is_empty() {
                return "No results".to_string();
            }
            let mut table = Table::new();
            table.set_header(vec![Cell::new(format!("{} ({})", query, ids.len()))]);
            for id in ids {
                table.add_row(vec![Cell::new(id)]);
            }
            table.to_string()
        }
        OutputFormat::Json => json!({ "query": query, "ids": ids }).to_string(),
    }
}

pub fn format_count(format: OutputFormat, query: &str, count: u64) -> String {
    match format {
        OutputFormat::Table => format!("{}: {} record(s)", query, count),
        OutputFormat::Json => json!({ "query": query, "count": count }).to_string(),
    }
}

pub fn format_match(format: OutputFormat, query: &str, record: &str, matched: bool) -> String {
    match format {
        OutputFormat::Table => {
            let verdict = if matched { "matches" } else { "does not match" };
            format!("{} {} {}", record, verdict, query)
        }
        OutputFormat::Json => {
            json!({ "query": query, "record": record, "matches": matched }).to_string()
        }
    }
}

pub fn format_stats(format: OutputFormat, stats: &CacheStats) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["Statistic", "Value"]);
            let rows = [
                ("enabled", stats.enabled.to_string()),
                ("entries", stats.entries.to_string()),
                ("tags", stats.tags.to_string()),
                ("hits", stats.hits.to_string()),
                ("misses", stats.misses.to_string()),
                ("hit rate", format!("{:.1}%", stats.hit_rate() * 100.0)),
                ("sets", stats.sets.to_string()),
                ("evictions", stats.evictions.to_string()),
                ("invalidations", stats.invalidations.to_string()),
            ];
            for (name, value) in rows {
                table.add_row(vec![name.to_string(), value]);
            }
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ids() {
        let ids = vec![RecordId::from("u1"), RecordId::from("u2")];
        let table = format_ids(OutputFormat::Table, "admins", &ids);
        assert!(table.contains("admins (2)"));
        assert!(table.contains("u2"));

        let json: serde_json::Value =
            serde_json::from_str(&format_ids(OutputFormat::Json, "admins", &ids)).unwrap();
        assert_eq!(json["ids"][1], "u2");

        assert_eq!(format_ids(OutputFormat::Table, "admins", &[]), "No results");
    }

    #[test]
    fn test_format_match_and_count() {
        assert_eq!(
            format_match(OutputFormat::Table, "admins", "u3", false),
            "u3 does not match admins"
        );
        assert_eq!(format_count(OutputFormat::Table, "admins", 2), "admins: 2 record(s)");

        let json: serde_json::Value =
            serde_json::from_str(&format_count(OutputFormat::Json, "admins", 2)).unwrap();
        assert_eq!(json["count"], 2);
    }

    #[test]
    fn test_format_stats() {
        let stats = CacheStats {
            enabled: true,
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        let table = format_stats(OutputFormat::Table, &stats);
        assert!(table.contains("75.0%"));

        let json: serde_json::Value =
            serde_json::from_str(&format_stats(OutputFormat::Json, &stats)).unwrap();
        assert_eq!(json["hits"], 3);
    }
}
