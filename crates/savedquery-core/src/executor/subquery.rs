//! Sub-query evaluation.
//!
//! AND groups run one child at a time, cheapest first, and stop as soon as the
//! running intersection is empty. OR groups run every child concurrently over
//! the shared session and union results as they arrive. A failing child is
//! logged and treated as absent in both modes.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use savedquery_proto::{MatchMode, Query, QueryId};

use super::combine::{merge, IdSet};
use super::evaluator::{label, live_sub_queries, Evaluator};
use crate::error::Result;

impl Evaluator<'_> {
    /// Combined id set of `query`'s sub-queries, before query-level polarity.
    ///
    /// `chain` is the ancestor chain including `query` itself.
    pub(crate) async fn evaluate_sub_queries(&self, query: &Query, chain: &[QueryId]) -> Option<IdSet> {
        let mut children = live_sub_queries(query, chain);
        if children.is_empty() {
            return None;
        }

        match query.match_queries {
            MatchMode::And => {
                children.sort_by_key(|child| child.complexity());
                let mut combined: Option<IdSet> = None;
                for child in children {
                    let result = self.evaluate(child, chain).await;
                    let Some(ids) = self.accept(query, child, result) else {
                        continue;
                    };
                    let merged = merge(combined.take(), ids, MatchMode::And);
                    if merged.is_empty() {
                        debug!(
                            query_id = %label(query),
                            sub_query = %label(child),
                            "intersection empty, stopping"
                        );
                        return Some(merged);
                    }
                    combined = Some(merged);
                }
                combined
            }
            MatchMode::Or => {
                let pending: Vec<BoxFuture<'_, (&Query, Result<Option<IdSet>>)>> = children
                    .into_iter()
                    .map(|child| {
                        let evaluation = self.evaluate(child, chain);
                        async move { (child, evaluation.await) }.boxed()
                    })
                    .collect();
                let mut results = stream::iter(pending)
                    .buffer_unordered(self.config.max_concurrent_subqueries.max(1));

                let mut combined: Option<IdSet> = None;
                while let Some((child, result)) = results.next().await {
                    if let Some(ids) = self.accept(query, child, result) {
                        combined = Some(merge(combined.take(), ids, MatchMode::Or));
                    }
                }
                combined
            }
        }
    }

    fn accept(&self, parent: &Query, child: &Query, result: Result<Option<IdSet>>) -> Option<IdSet> {
        match result {
            Ok(ids) => ids,
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
