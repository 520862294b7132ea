//! JSON fixtures: records, edges, paths and saved queries.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use savedquery_core::{MemoryStore, StoredRecord};
use savedquery_proto::{Query, QueryPath, RecordId};

/// One labelled edge.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeSpec {
    pub source: RecordId,
    pub label: String,
    pub target: RecordId,
}

/// Everything the runner needs to build a store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub records: Vec<StoredRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub paths: Vec<QueryPath>,
    /// Saved queries, looked up by id.
    #[serde(default)]
    pub queries: Vec<Query>,
}

impl Fixture {
    /// Read a fixture from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid fixture {}", path.display()))
    }

    /// Parse a fixture from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(text)?;
        if let Some(query) = fixture.queries.iter().find(|q| q.id.is_none()) {
            return Err(anyhow!(
                "every fixture query needs an id (found one over {})",
                query.meta_type
            ));
        }
        Ok(fixture)
    }

    /// Load records, edges and paths into a fresh store.
    pub fn build_store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        for record in &self.records {
            store.insert_record(record.clone());
        }
        for edge in &self.edges {
            store.add_edge(edge.source.clone(), edge.label.clone(), edge.target.clone());
        }
        for path in &self.paths {
            store.add_path(path.clone());
        }
        tracing::debug!(
            records = self.records.len(),
            edges = self.edges.len(),
            paths = self.paths.len(),
            "fixture loaded"
        );
        store
    }

    /// Find a saved query by id.
    pub fn query(&self, id: &str) -> Result<&Query> {
        self.queries
            .iter()
            .find(|q| q.id.as_ref().is_some_and(|qid| qid.as_str() == id))
            .ok_or_else(|| anyhow!("no query with id {:?} in fixture", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "records": [
            {"id": "u1", "meta_type": "user", "value": "alice"},
            {"id": "admin", "meta_type": "role"}
        ],
        "edges": [{"source": "u1", "label": "HAS_ROLE", "target": "admin"}],
        "paths": [{
            "id": "role",
            "expression": "(s)-[:HAS_ROLE]->(t)",
            "source_type": "user",
            "target_type": "role"
        }],
        "queries": [{
            "id": "admins",
            "meta_type": "user",
            "values": [{"id": "v1", "path": "role", "lookup": "equal", "values": ["admin"]}]
        }]
    }"#;

    #[test]
    fn test_parse_fixture() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        assert_eq!(fixture.records.len(), 2);
        assert_eq!(fixture.edges[0].label, "HAS_ROLE");

        let query = fixture.query("admins").unwrap();
        assert_eq!(query.values.len(), 1);
        assert!(fixture.query("missing").is_err());
    }

    #[test]
    fn test_queries_need_ids() {
        let err = Fixture::from_json(r#"{"queries": [{"meta_type": "user"}]}"#).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn test_build_store() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        let store = fixture.build_store();
        assert_eq!(store.open_sessions(), 0);
        assert_eq!(store.statements_executed(), 0);
    }
}
