//! Set combination under AND/OR.
//!
//! A group that contributed no constraint is represented as `None` and never
//! narrows or widens the other side. `Some` of an empty set is a real
//! constraint that matched nothing.

use std::collections::BTreeSet;

use savedquery_proto::{MatchMode, RecordId};

/// Ordered set of matching record ids.
pub type IdSet = BTreeSet<RecordId>;

/// Fold one more result into a running one.
pub(crate) fn merge(acc: Option<IdSet>, next: IdSet, mode: MatchMode) -> IdSet {
    match acc {
        None => next,
        Some(acc) => match mode {
            MatchMode::And => acc.intersection(&next).cloned().collect(),
            MatchMode::Or => {
                let mut acc = acc;
                acc.extend(next);
                acc
            }
        },
    }
}

/// Combine the value group with the sub-query group.
pub(crate) fn combine(values: Option<IdSet>, subs: Option<IdSet>, mode: MatchMode) -> Option<IdSet> {
    match (values, subs) {
        (None, other) | (other, None) => other,
        (Some(values), Some(subs)) => Some(merge(Some(values), subs, mode)),
    }
}

/// Combine two single-record outcomes the same way [`combine`] combines sets.
pub(crate) fn combine_matches(values: Option<bool>, subs: Option<bool>, mode: MatchMode) -> Option<bool> {
    match (values, subs) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => Some(match mode {
            MatchMode::And => a && b,
            MatchMode::Or => a || b,
        }),
    }
}

/// Ids of `universe` not in `set`.
pub(crate) fn complement(universe: &IdSet, set: &IdSet) -> IdSet {
    universe.difference(set).cloned().collect()
}
