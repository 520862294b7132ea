//! Composable query definitions.
//!
//! A `Query` filters records of one meta-type through value clauses and nested
//! sub-queries. Queries are built and validated upstream; the engine only ever
//! reads them.

use serde::{Deserialize, Serialize};

use crate::ids::{MetaTypeId, PathId, QueryId, ValueId};
use crate::lookup::Lookup;

/// How a list of clauses is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchMode {
    /// Every clause must match (intersection).
    #[default]
    And,
    /// Any clause may match (union).
    Or,
}

/// Whether a clause selects or rejects what it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarity {
    /// Keep records that match.
    #[default]
    Include,
    /// Keep records that do not match.
    Exclude,
}

/// One value clause: records whose path reaches a target satisfying the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryValue {
    /// Clause identifier, used for logging.
    pub id: ValueId,
    /// Path from the query's meta-type to the compared targets.
    pub path: PathId,
    /// Comparison operator. `None` means equality.
    #[serde(default)]
    pub lookup: Option<Lookup>,
    /// Candidate values, in order.
    #[serde(default)]
    pub values: Vec<ValueId>,
    /// Include or exclude matching records.
    #[serde(default)]
    pub polarity: Polarity,
}

impl QueryValue {
    /// Create an equality clause with no candidates yet.
    pub fn new(id: impl Into<ValueId>, path: impl Into<PathId>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            lookup: None,
            values: Vec::new(),
            polarity: Polarity::Include,
        }
    }

    /// Set the lookup operator.
    pub fn with_lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Append a candidate value.
    pub fn with_value(mut self, value: impl Into<ValueId>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Replace the candidate values.
    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ValueId>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Reject matching records instead of keeping them.
    pub fn excluding(mut self) -> Self {
        self.polarity = Polarity::Exclude;
        self
    }
}

/// A composable filter over one meta-type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier when persisted; `None` for ad-hoc queries.
    #[serde(default)]
    pub id: Option<QueryId>,
    /// Record type this query filters.
    pub meta_type: MetaTypeId,
    /// Value clauses, in order.
    #[serde(default)]
    pub values: Vec<QueryValue>,
    /// Nested sub-queries, in order.
    #[serde(default)]
    pub sub_queries: Vec<Query>,
    /// How value clauses are combined.
    #[serde(default)]
    pub match_values: MatchMode,
    /// How sub-queries (and the value group) are combined.
    #[serde(default)]
    pub match_queries: MatchMode,
    /// Polarity of the combined value group.
    #[serde(default)]
    pub include_values: Polarity,
    /// Polarity of the combined sub-query group.
    #[serde(default)]
    pub include_queries: Polarity,
}

impl Query {
    /// Create an empty, unpersisted query over a meta-type.
    pub fn new(meta_type: impl Into<MetaTypeId>) -> Self {
        Self {
            id: None,
            meta_type: meta_type.into(),
            values: Vec::new(),
            sub_queries: Vec::new(),
            match_values: MatchMode::And,
            match_queries: MatchMode::And,
            include_values: Polarity::Include,
            include_queries: Polarity::Include,
        }
    }

    /// Mark the query as persisted under `id`.
    pub fn with_id(mut self, id: impl Into<QueryId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append a value clause.
    pub fn with_value(mut self, value: QueryValue) -> Self {
        self.values.push(value);
        self
    }

    /// Append a sub-query.
    pub fn with_sub_query(mut self, query: Query) -> Self {
        self.sub_queries.push(query);
        self
    }

    /// Set how value clauses combine.
    pub fn match_values(mut self, mode: MatchMode) -> Self {
        self.match_values = mode;
        self
    }

    /// Set how sub-queries combine.
    pub fn match_queries(mut self, mode: MatchMode) -> Self {
        self.match_queries = mode;
        self
    }

    /// Set the polarity of the value group.
    pub fn include_values(mut self, polarity: Polarity) -> Self {
        self.include_values = polarity;
        self
    }

    /// Set the polarity of the sub-query group.
    pub fn include_queries(mut self, polarity: Polarity) -> Self {
        self.include_queries = polarity;
        self
    }

    /// Rough evaluation cost: number of direct clauses and children.
    pub fn complexity(&self) -> usize {
        self.values.len() + self.sub_queries.len()
    }

    /// Every distinct path referenced by this query's own value clauses.
    pub fn path_ids(&self) -> Vec<PathId> {
        let mut ids: Vec<PathId> = self.values.iter().map(|v| v.path.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
