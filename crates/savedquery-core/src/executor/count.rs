//! Match counting.

use tracing::{debug, warn};

use savedquery_proto::{Polarity, Query};

use super::evaluator::{count_from_rows, label, Evaluator};
use super::values::build_clauses;
use crate::error::Result;
use crate::statement::StatementBuilder;

impl Evaluator<'_> {
    /// Number of records `query` matches.
    ///
    /// Queries with no sub-queries and few enough values are counted with one
    /// statement; everything else, and any failure of that statement, falls
    /// back to the length of the full result.
    pub(crate) async fn count(&self, query: &Query) -> Result<u64> {
        if !query.sub_queries.is_empty() || query.values.len() > self.config.fast_path_max_values {
            debug!(
                query_id = %label(query),
                values = query.values.len(),
                sub_queries = query.sub_queries.len(),
                "count fast path not applicable"
            );
            return self.count_in_full(query).await;
        }

        match self.count_fast(query).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(
                    query_id = %label(query),
                    error = %e,
                    "count fast path failed, evaluating in full"
                );
                self.count_in_full(query).await
            }
        }
    }

    async fn count_fast(&self, query: &Query) -> Result<u64> {
        if query.values.is_empty() {
            return Ok(0);
        }

        let paths = self.paths.get_paths(&query.path_ids()).await?;
        let builder = StatementBuilder::new(&query.meta_type);
        let clauses = build_clauses(query, &paths, &builder);
        if clauses.is_empty() {
            return Ok(0);
        }

        let statement = builder.count(
            clauses,
            query.match_values,
            query.include_values == Polarity::Exclude,
        );
        let rows = self.session.execute(&statement).await?;
        count_from_rows(rows)
    }

    async fn count_in_full(&self, query: &Query) -> Result<u64> {
        let ids = self.evaluate(query, &[]).await?;
        Ok(ids.map_or(0, |ids| ids.len() as u64))
    }
}
