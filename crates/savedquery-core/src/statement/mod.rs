//! Parameterized statements.
//!
//! The engine describes every store round trip as a [`Statement`]. Backends
//! either interpret the structure directly (see [`crate::store::MemoryStore`])
//! or render it to SQL with [`Statement::render`], which binds every literal as
//! a `$n` parameter.

mod builder;
mod condition;
mod render;

pub use builder::StatementBuilder;
pub use condition::{CompareOp, Condition, ConditionBuilder, Param, TextOp};
pub use render::RenderedStatement;

use serde::Serialize;

use savedquery_proto::{MatchMode, MetaTypeId, Polarity, RecordId, Traversal};

use crate::strategy::Strategy;

/// One value clause, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    /// Statement shape.
    pub strategy: Strategy,
    /// Path from `s` to `t`.
    pub traversal: Traversal,
    /// Predicate over `t`.
    pub condition: Condition,
    /// Whether a source is kept when the traversal matches, or when it does not.
    pub polarity: Polarity,
}

/// Clauses combined into one boolean expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseGroup {
    pub clauses: Vec<Clause>,
    pub mode: MatchMode,
    /// Negate the combined expression.
    pub negated: bool,
}

/// A single store round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Statement {
    /// Ids of `meta_type` records satisfying one clause.
    MatchIds {
        meta_type: MetaTypeId,
        clause: Clause,
    },
    /// Every id of `meta_type`.
    AllIds { meta_type: MetaTypeId },
    /// Whether `record` exists as a `meta_type` record.
    RecordExists {
        meta_type: MetaTypeId,
        record: RecordId,
    },
    /// Whether `record` satisfies `group`.
    MatchRecord {
        meta_type: MetaTypeId,
        record: RecordId,
        group: ClauseGroup,
    },
    /// Number of `meta_type` records satisfying `group`.
    Count {
        meta_type: MetaTypeId,
        group: ClauseGroup,
    },
}

impl Statement {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::MatchIds { .. } => "match_ids",
            Statement::AllIds { .. } => "all_ids",
            Statement::RecordExists { .. } => "record_exists",
            Statement::MatchRecord { .. } => "match_record",
            Statement::Count { .. } => "count",
        }
    }

    /// Meta-type the statement reads.
    pub fn meta_type(&self) -> &MetaTypeId {
        match self {
            Statement::MatchIds { meta_type, .. }
            | Statement::AllIds { meta_type }
            | Statement::RecordExists { meta_type, .. }
            | Statement::MatchRecord { meta_type, .. }
            | Statement::Count { meta_type, .. } => meta_type,
        }
    }
}
