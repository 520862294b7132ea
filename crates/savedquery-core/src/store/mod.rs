//! Store collaborators.
//!
//! The engine only reads. It needs a [`ReadSession`] to run statements, a
//! [`SessionProvider`] to open one when the caller does not supply it, and a
//! [`PathStore`] for path metadata. [`MemoryStore`] implements all three.

mod memory;

pub use memory::{MemorySession, MemoryStore};

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use savedquery_proto::{MetaTypeId, PathId, QueryPath, RecordId};

use crate::statement::Statement;

/// Store-side failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A statement failed to execute.
    #[error("statement failed: {0}")]
    Statement(String),

    /// The session or its connection is unusable.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend cannot run this kind of statement.
    #[error("unsupported statement: {0}")]
    Unsupported(String),
}

/// One result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Id(RecordId),
    Int(i64),
    Bool(bool),
    Null,
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<Datum>);

impl Row {
    /// A single-column row.
    pub fn single(datum: Datum) -> Self {
        Self(vec![datum])
    }

    /// First column, if any.
    pub fn first(&self) -> Option<&Datum> {
        self.0.first()
    }
}

/// A stored record as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub meta_type: MetaTypeId,
    /// Scalar value compared by text and ordering lookups.
    #[serde(default)]
    pub value: Option<String>,
    /// Named properties compared by `property_values`.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl StoredRecord {
    /// Create a record with no value or properties.
    pub fn new(id: impl Into<RecordId>, meta_type: impl Into<MetaTypeId>) -> Self {
        Self {
            id: id.into(),
            meta_type: meta_type.into(),
            value: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set the scalar value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// A read-only session against the hybrid store.
#[async_trait]
pub trait ReadSession: Send + Sync {
    /// Run a statement and return its rows.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;

    /// Fetch one record of `meta_type` by id.
    async fn get(
        &self,
        meta_type: &MetaTypeId,
        id: &RecordId,
    ) -> Result<Option<StoredRecord>, StoreError>;
}

/// Opens read sessions. A session is released when dropped.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ReadSession>, StoreError>;
}

/// Path metadata, loaded in batches.
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Load every known path among `ids`. Unknown ids are simply absent.
    async fn get_paths(&self, ids: &[PathId]) -> Result<HashMap<PathId, QueryPath>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = StoredRecord::new("u1", "user")
            .with_value("Alice")
            .with_property("tier", "gold");
        assert_eq!(record.value.as_deref(), Some("Alice"));
        assert_eq!(record.properties.get("tier").map(String::as_str), Some("gold"));
    }

    #[test]
    fn test_row_first() {
        let row = Row::single(Datum::Int(3));
        assert_eq!(row.first(), Some(&Datum::Int(3)));
        assert_eq!(Row::default().first(), None);
    }
}
