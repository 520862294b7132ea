//! Full evaluation of one query tree against an open session.

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use savedquery_proto::{MatchMode, MetaTypeId, Polarity, Query, QueryId};

use super::combine::{combine, complement, IdSet};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::statement::StatementBuilder;
use crate::store::{Datum, PathStore, ReadSession, Row};

/// Per-call evaluation context. Borrowed by every level of the recursion.
#[derive(Clone, Copy)]
pub(crate) struct Evaluator<'a> {
    pub(crate) session: &'a dyn ReadSession,
    pub(crate) paths: &'a dyn PathStore,
    pub(crate) config: &'a EngineConfig,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        session: &'a dyn ReadSession,
        paths: &'a dyn PathStore,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            session,
            paths,
            config,
        }
    }

    /// Evaluate `query` in full.
    ///
    /// `ancestors` holds the ids of every enclosing persisted query. `None`
    /// means the query constrains nothing.
    pub(crate) fn evaluate<'s>(
        &'s self,
        query: &'s Query,
        ancestors: &'s [QueryId],
    ) -> BoxFuture<'s, Result<Option<IdSet>>> {
        async move {
            let mut values = self.evaluate_values(query).await?;
            if let Some(ids) = values.take() {
                values = Some(match query.include_values {
                    Polarity::Include => ids,
                    Polarity::Exclude => complement(&self.universe(&query.meta_type).await?, &ids),
                });
            }

            if query.match_queries == MatchMode::And
                && values.as_ref().is_some_and(|ids| ids.is_empty())
            {
                debug!(query_id = %label(query), "value group empty, skipping sub-queries");
                return Ok(values);
            }

            let chain = with_ancestor(ancestors, query);
            let mut subs = self.evaluate_sub_queries(query, &chain).await;
            if let Some(ids) = subs.take() {
                subs = Some(match query.include_queries {
                    Polarity::Include => ids,
                    Polarity::Exclude => complement(&self.universe(&query.meta_type).await?, &ids),
                });
            }

            Ok(combine(values, subs, query.match_queries))
        }
        .boxed()
    }

    /// Every id of `meta_type`.
    pub(crate) async fn universe(&self, meta_type: &MetaTypeId) -> Result<IdSet> {
        let statement = StatementBuilder::new(meta_type).all_ids();
        let rows = self.session.execute(&statement).await?;
        ids_from_rows(rows)
    }
}

/// Ancestor chain for the children of `query`.
pub(crate) fn with_ancestor(ancestors: &[QueryId], query: &Query) -> Vec<QueryId> {
    let mut chain = ancestors.to_vec();
    if let Some(id) = &query.id {
        chain.push(id.clone());
    }
    chain
}

/// Children of `query` that do not refer back to an ancestor.
pub(crate) fn live_sub_queries<'q>(query: &'q Query, chain: &[QueryId]) -> Vec<&'q Query> {
    query
        .sub_queries
        .iter()
        .filter(|child| match &child.id {
            Some(id) if chain.contains(id) => {
                debug!(query_id = %label(query), sub_query = %id, "pruned self-referencing sub-query");
                false
            }
            _ => true,
        })
        .collect()
}

/// Query identifier for log fields.
pub(crate) fn label(query: &Query) -> &str {
    query.id.as_ref().map_or("<unsaved>", |id| id.as_str())
}

pub(crate) fn ids_from_rows(rows: Vec<Row>) -> Result<IdSet> {
    rows.into_iter()
        .map(|row| match row.0.into_iter().next() {
            Some(Datum::Id(id)) => Ok(id),
            other => Err(Error::Internal(format!("expected an id column, got {:?}", other))),
        })
        .collect()
}

pub(crate) fn bool_from_rows(rows: Vec<Row>) -> Result<bool> {
    match rows.first().and_then(Row::first) {
        Some(Datum::Bool(b)) => Ok(*b),
        Some(Datum::Int(n)) => Ok(*n != 0),
        other => Err(Error::Internal(format!("expected a boolean, got {:?}", other))),
    }
}

pub(crate) fn count_from_rows(rows: Vec<Row>) -> Result<u64> {
    match rows.first().and_then(Row::first) {
        Some(Datum::Int(n)) => u64::try_from(*n)
            .map_err(|_| Error::Internal(format!("negative count {}", n))),
        other => Err(Error::Internal(format!("expected a count, got {:?}", other))),
    }
}
