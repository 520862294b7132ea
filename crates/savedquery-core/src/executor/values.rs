//! Value-clause evaluation.

use std::collections::HashMap;

use tracing::{debug, warn};

use savedquery_proto::{MatchMode, PathId, Query, QueryPath, QueryValue};

use super::combine::{merge, IdSet};
use super::evaluator::{ids_from_rows, label, Evaluator};
use crate::error::{Error, Result};
use crate::statement::{Clause, StatementBuilder};
use crate::strategy::Strategy;

impl Evaluator<'_> {
    /// Combined id set of `query`'s value clauses, before query-level polarity.
    ///
    /// Paths are loaded in one batch; failing to load them is the only error.
    /// A clause that cannot be built or executed is logged and skipped.
    pub(crate) async fn evaluate_values(&self, query: &Query) -> Result<Option<IdSet>> {
        if query.values.is_empty() {
            return Ok(None);
        }

        let paths = self.paths.get_paths(&query.path_ids()).await?;
        let builder = StatementBuilder::new(&query.meta_type);

        if let Some(ids) = self.single_equality(query, &paths, &builder).await {
            return Ok(Some(ids));
        }

        let mut combined: Option<IdSet> = None;
        for value in &query.values {
            let ids = match self.evaluate_value(query, value, &paths, &builder).await {
                Ok(Some(ids)) => ids,
                Ok(None) => {
                    debug!(
                        query_id = %label(query),
                        value_id = %value.id,
                        "value has no candidates, no constraint"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        query_id = %label(query),
                        value_id = %value.id,
                        path_id = %value.path,
                        error = %e,
                        "skipping value"
                    );
                    continue;
                }
            };

            let merged = merge(combined.take(), ids, query.match_values);
            if query.match_values == MatchMode::And && merged.is_empty() {
                return Ok(Some(merged));
            }
            combined = Some(merged);
        }

        Ok(combined)
    }

    /// One direct join for a query made of a single included equality clause
    /// on a single hop with one candidate. `None` when not applicable or when
    /// the statement fails.
    async fn single_equality(
        &self,
        query: &Query,
        paths: &HashMap<PathId, QueryPath>,
        builder: &StatementBuilder<'_>,
    ) -> Option<IdSet> {
        let [value] = query.values.as_slice() else {
            return None;
        };
        let clause = direct_clause(builder, value, paths)?;

        let statement = builder.match_ids(clause);
        match self.session.execute(&statement).await.map_err(Error::from).and_then(ids_from_rows) {
            Ok(ids) => {
                debug!(
                    query_id = %label(query),
                    value_id = %value.id,
                    strategy = %Strategy::Direct,
                    matched = ids.len(),
                    "single equality fast path"
                );
                Some(ids)
            }
            Err(e) => {
                warn!(
                    query_id = %label(query),
                    value_id = %value.id,
                    error = %e,
                    "fast path failed, evaluating generally"
                );
                None
            }
        }
    }

    async fn evaluate_value(
        &self,
        query: &Query,
        value: &QueryValue,
        paths: &HashMap<PathId, QueryPath>,
        builder: &StatementBuilder<'_>,
    ) -> Result<Option<IdSet>> {
        let Some(clause) = builder.clause(value, paths.get(&value.path))? else {
            return Ok(None);
        };
        debug!(
            query_id = %label(query),
            value_id = %value.id,
            strategy = %clause.strategy,
            "evaluating value"
        );
        let rows = self.session.execute(&builder.match_ids(clause)).await?;
        ids_from_rows(rows).map(Some)
    }
}

/// The clause for `value` when it qualifies for the direct join.
pub(crate) fn direct_clause(
    builder: &StatementBuilder<'_>,
    value: &QueryValue,
    paths: &HashMap<PathId, QueryPath>,
) -> Option<Clause> {
    builder
        .clause(value, paths.get(&value.path))
        .ok()
        .flatten()
        .filter(|clause| clause.strategy == Strategy::Direct)
}

/// Build the clause for every value, skipping the ones that constrain nothing
/// or cannot be built.
pub(crate) fn build_clauses(
    query: &Query,
    paths: &HashMap<PathId, QueryPath>,
    builder: &StatementBuilder<'_>,
) -> Vec<Clause> {
    query
        .values
        .iter()
        .filter_map(|value| match builder.clause(value, paths.get(&value.path)) {
            Ok(clause) => clause,
            Err(e) => {
                warn!(
                    query_id = %label(query),
                    value_id = %value.id,
                    path_id = %value.path,
                    error = %e,
                    "skipping value"
                );
                None
            }
        })
        .collect()
}
