//! Statement construction.

use savedquery_proto::{MatchMode, MetaTypeId, QueryPath, QueryValue, RecordId};

use super::{Clause, ClauseGroup, ConditionBuilder, Statement};
use crate::error::{Error, Result};
use crate::strategy::Strategy;

/// Builds statements scoped to one meta-type.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    meta_type: &'a MetaTypeId,
}

impl<'a> StatementBuilder<'a> {
    /// Create a builder for `meta_type`.
    pub fn new(meta_type: &'a MetaTypeId) -> Self {
        Self { meta_type }
    }

    /// Turn a value clause into an executable [`Clause`].
    ///
    /// Returns `Ok(None)` when the clause has no candidate values and its
    /// lookup needs some: such a clause constrains nothing.
    pub fn clause(&self, value: &QueryValue, path: Option<&QueryPath>) -> Result<Option<Clause>> {
        let path = path.ok_or_else(|| Error::PathResolution {
            path: value.path.clone(),
        })?;

        let takes_values = value.lookup.as_ref().map_or(true, |l| l.takes_values());
        if takes_values && value.values.is_empty() {
            return Ok(None);
        }

        if &path.source_type != self.meta_type {
            return Err(Error::InvalidValue {
                value: value.id.clone(),
                reason: format!(
                    "path {} starts at {}, query filters {}",
                    path.id, path.source_type, self.meta_type
                ),
            });
        }

        let traversal = path.traversal()?;
        let strategy = Strategy::select(value, &traversal);
        let condition = ConditionBuilder::build(value.lookup.as_ref(), &value.values);

        Ok(Some(Clause {
            strategy,
            traversal,
            condition,
            polarity: value.polarity,
        }))
    }

    /// Ids satisfying one clause.
    pub fn match_ids(&self, clause: Clause) -> Statement {
        Statement::MatchIds {
            meta_type: self.meta_type.clone(),
            clause,
        }
    }

    /// Every id of the meta-type.
    pub fn all_ids(&self) -> Statement {
        Statement::AllIds {
            meta_type: self.meta_type.clone(),
        }
    }

    /// Existence probe for one record.
    pub fn record_exists(&self, record: &RecordId) -> Statement {
        Statement::RecordExists {
            meta_type: self.meta_type.clone(),
            record: record.clone(),
        }
    }

    /// Single boolean check of `record` against a clause group.
    pub fn match_record(
        &self,
        record: &RecordId,
        clauses: Vec<Clause>,
        mode: MatchMode,
        negated: bool,
    ) -> Statement {
        Statement::MatchRecord {
            meta_type: self.meta_type.clone(),
            record: record.clone(),
            group: ClauseGroup {
                clauses,
                mode,
                negated,
            },
        }
    }

    /// Count of records satisfying a clause group.
    pub fn count(&self, clauses: Vec<Clause>, mode: MatchMode, negated: bool) -> Statement {
        Statement::Count {
            meta_type: self.meta_type.clone(),
            group: ClauseGroup {
                clauses,
                mode,
                negated,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Condition;
    use savedquery_proto::{Lookup, PathId};

    fn role_path() -> QueryPath {
        QueryPath::new("p1", "(s)-[:HAS_ROLE]->(t)", "user", "role")
    }

    #[test]
    fn test_clause_for_single_equality() {
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let value = QueryValue::new("v1", "p1").with_value("admin");

        let clause = builder.clause(&value, Some(&role_path())).unwrap().unwrap();
        assert_eq!(clause.strategy, Strategy::Direct);
        assert!(matches!(clause.condition, Condition::IdIn(ref ids) if ids.len() == 1));

        let statement = builder.match_ids(clause);
        assert_eq!(statement.kind(), "match_ids");
        assert_eq!(statement.meta_type(), &meta);
        assert_eq!(builder.all_ids().meta_type(), &meta);
    }

    #[test]
    fn test_unresolved_path_is_an_error() {
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let value = QueryValue::new("v1", "missing").with_value("admin");

        match builder.clause(&value, None) {
            Err(Error::PathResolution { path }) => assert_eq!(path, PathId::from("missing")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_values_constrain_nothing() {
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let value = QueryValue::new("v1", "p1");
        assert!(builder.clause(&value, Some(&role_path())).unwrap().is_none());
    }

    #[test]
    fn test_null_lookup_needs_no_values() {
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let value = QueryValue::new("v1", "p1").with_lookup(Lookup::Null);
        let clause = builder.clause(&value, Some(&role_path())).unwrap().unwrap();
        assert_eq!(clause.condition, Condition::IsNull);
        assert_eq!(clause.strategy, Strategy::Standard);
    }

    #[test]
    fn test_source_type_mismatch() {
        let meta = MetaTypeId::from("order");
        let builder = StatementBuilder::new(&meta);
        let value = QueryValue::new("v1", "p1").with_value("admin");
        assert!(matches!(
            builder.clause(&value, Some(&role_path())),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bad_traversal() {
        let meta = MetaTypeId::from("user");
        let builder = StatementBuilder::new(&meta);
        let path = QueryPath::new("p1", "user has role", "user", "role");
        let value = QueryValue::new("v1", "p1").with_value("admin");
        assert!(matches!(
            builder.clause(&value, Some(&path)),
            Err(Error::Model(_))
        ));
    }
}
