//! Statement strategy selection.
//!
//! Each value clause is turned into one of three statement shapes:
//! - Direct: a single edge join compared against one target id
//! - Exists: a `NOT EXISTS` anti-join over the traversal, for excluded clauses
//! - Standard: a general `EXISTS` over the traversal with the lookup condition

use std::fmt;

use serde::Serialize;

use savedquery_proto::{is_equality, Polarity, QueryValue, Traversal};

/// Statement-generation strategy for one value clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strategy {
    /// One edge join, target id compared directly.
    Direct,
    /// Anti-join over the traversal.
    Exists,
    /// General traversal with the lookup condition.
    Standard,
}

impl Strategy {
    /// Select the strategy for a clause.
    ///
    /// Exclusion always takes the anti-join. Otherwise the direct join is used
    /// when the lookup is equality (or unset), the traversal is a single hop,
    /// and there is exactly one candidate value.
    pub fn select(value: &QueryValue, traversal: &Traversal) -> Self {
        if value.polarity == Polarity::Exclude {
            Strategy::Exists
        } else if is_equality(value.lookup.as_ref())
            && traversal.is_single_hop()
            && value.values.len() == 1
        {
            Strategy::Direct
        } else {
            Strategy::Standard
        }
    }

    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Exists => "exists",
            Strategy::Standard => "standard",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
