//! Single-record match checks.
//!
//! A record is first probed for existence. Each query level then checks its
//! value group with one boolean statement scoped to the record, short-circuits
//! on the combinator, and only then recurses into sub-queries. Any level whose
//! statement fails, or that has too many values, is evaluated in full instead.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use savedquery_proto::{MatchMode, Polarity, Query, QueryId, RecordId};

use super::combine::combine_matches;
use super::evaluator::{bool_from_rows, label, live_sub_queries, with_ancestor, Evaluator};
use super::values::build_clauses;
use crate::error::{Error, Result};
use crate::statement::StatementBuilder;

impl Evaluator<'_> {
    /// Whether `record` is in the result of `query`.
    pub(crate) async fn record_matches_query(&self, query: &Query, record: &RecordId) -> Result<bool> {
        let probe = StatementBuilder::new(&query.meta_type).record_exists(record);
        match self
            .session
            .execute(&probe)
            .await
            .map_err(Error::from)
            .and_then(bool_from_rows)
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(query_id = %label(query), record = %record, "record does not exist");
                return Ok(false);
            }
            Err(e) => {
                warn!(
                    query_id = %label(query),
                    record = %record,
                    error = %e,
                    "existence probe failed, evaluating in full"
                );
                return Ok(self.record_in_full(query, record, &[]).await?.unwrap_or(false));
            }
        }

        Ok(self.record_matches(query, record, &[]).await?.unwrap_or(false))
    }

    /// `None` when the query constrains nothing.
    fn record_matches<'s>(
        &'s self,
        query: &'s Query,
        record: &'s RecordId,
        ancestors: &'s [QueryId],
    ) -> BoxFuture<'s, Result<Option<bool>>> {
        async move {
            if query.values.len() > self.config.fast_path_max_values {
                debug!(
                    query_id = %label(query),
                    values = query.values.len(),
                    "too many values for record fast path"
                );
                return self.record_in_full(query, record, ancestors).await;
            }

            match self.record_matches_fast(query, record, ancestors).await {
                Ok(matched) => Ok(matched),
                Err(e) => {
                    warn!(
                        query_id = %label(query),
                        record = %record,
                        error = %e,
                        "record fast path failed, evaluating in full"
                    );
                    self.record_in_full(query, record, ancestors).await
                }
            }
        }
        .boxed()
    }

    async fn record_in_full(
        &self,
        query: &Query,
        record: &RecordId,
        ancestors: &[QueryId],
    ) -> Result<Option<bool>> {
        Ok(self
            .evaluate(query, ancestors)
            .await?
            .map(|ids| ids.contains(record)))
    }

    async fn record_matches_fast(
        &self,
        query: &Query,
        record: &RecordId,
        ancestors: &[QueryId],
    ) -> Result<Option<bool>> {
        let values = self.record_value_group(query, record).await?;
        match (values, query.match_queries) {
            (Some(false), MatchMode::And) | (Some(true), MatchMode::Or) => return Ok(values),
            _ => {}
        }

        let chain = with_ancestor(ancestors, query);
        let subs = self
            .record_sub_queries(query, record, &chain)
            .await
            .map(|matched| match query.include_queries {
                Polarity::Include => matched,
                Polarity::Exclude => !matched,
            });

        Ok(combine_matches(values, subs, query.match_queries))
    }

    /// The value group checked with one statement, query-level polarity applied.
    async fn record_value_group(&self, query: &Query, record: &RecordId) -> Result<Option<bool>> {
        if query.values.is_empty() {
            return Ok(None);
        }

        let paths = self.paths.get_paths(&query.path_ids()).await?;
        let builder = StatementBuilder::new(&query.meta_type);
        let clauses = build_clauses(query, &paths, &builder);
        if clauses.is_empty() {
            return Ok(None);
        }

        if let [clause] = clauses.as_slice() {
            debug!(
                query_id = %label(query),
                record = %record,
                strategy = %clause.strategy,
                "single clause record check"
            );
        }

        let statement = builder.match_record(
            record,
            clauses,
            query.match_values,
            query.include_values == Polarity::Exclude,
        );
        let rows = self.session.execute(&statement).await?;
        bool_from_rows(rows).map(Some)
    }

    async fn record_sub_queries(
        &self,
        query: &Query,
        record: &RecordId,
        chain: &[QueryId],
    ) -> Option<bool> {
        let mut children = live_sub_queries(query, chain);
        if children.is_empty() {
            return None;
        }

        match query.match_queries {
            MatchMode::And => {
                children.sort_by_key(|child| child.complexity());
                let mut matched = None;
                for child in children {
                    match self.child_matches(query, child, record, chain).await {
                        Some(false) => return Some(false),
                        Some(true) => matched = Some(true),
                        None => {}
                    }
                }
                matched
            }
            MatchMode::Or => {
                let pending: Vec<BoxFuture<'_, Option<bool>>> = children
                    .into_iter()
                    .map(|child| self.child_matches(query, child, record, chain).boxed())
                    .collect();
                let mut results = stream::iter(pending)
                    .buffer_unordered(self.config.max_concurrent_subqueries.max(1));

                let mut matched = None;
                while let Some(result) = results.next().await {
                    match result {
                        Some(true) => return Some(true),
                        Some(false) => matched = Some(false),
                        None => {}
                    }
                }
                matched
            }
        }
    }

    async fn child_matches(
        &self,
        parent: &Query,
        child: &Query,
        record: &RecordId,
        chain: &[QueryId],
    ) -> Option<bool> {
        // The existence probe only covers the parent's meta-type.
        let result = if child.meta_type == parent.meta_type {
            self.record_matches(child, record, chain).await
        } else {
            self.record_in_full(child, record, chain).await
        };

        match result {
            Ok(matched) => matched,
            Err(e) => {
                warn!(
                    query_id = %label(parent),
                    sub_query = %label(child),
                    error = %e,
                    "sub-query failed, excluding it"
                );
                None
            }
        }
    }
}
