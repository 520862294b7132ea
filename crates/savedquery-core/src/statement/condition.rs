//! Lookup condition building.
//!
//! Turns a lookup operator and its candidate values into a boolean predicate
//! over the target alias `t`. Candidate values always travel as [`Param`]s and
//! are bound at render time.

use serde::Serialize;

use savedquery_proto::{Lookup, ValueId};

/// A value that is bound as a statement parameter, never spliced into text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Param(String);

impl Param {
    /// Wrap a literal.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The bound literal.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ValueId> for Param {
    fn from(value: &ValueId) -> Self {
        Self(value.as_str().to_string())
    }
}

/// Text predicates applied to the target's scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
    /// SQL LIKE pattern with `%` and `_` wildcards.
    Like,
}

/// Ordering comparisons applied to the target's scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Boolean predicate over the target of a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Condition {
    /// Target id is one of the parameters.
    IdIn(Vec<Param>),
    /// Target value satisfies the text predicate for any parameter.
    Text { op: TextOp, patterns: Vec<Param> },
    /// Target value satisfies the comparison for any parameter.
    Compare { op: CompareOp, values: Vec<Param> },
    /// Target value lies in `[low, high]`.
    Between { low: Param, high: Param },
    /// Target has no scalar value.
    IsNull,
    /// Target has a scalar value.
    IsNotNull,
    /// Every `(property, value)` pair matches the target's properties.
    Properties(Vec<(Param, Param)>),
    /// Matches nothing.
    Never,
}

/// Builds conditions from lookup operators.
pub struct ConditionBuilder;

impl ConditionBuilder {
    /// Build the condition for `lookup` over `values`.
    ///
    /// Malformed input degrades to [`Condition::Never`] instead of failing:
    /// `range` with fewer than two values, and `property_values` entries that
    /// do not split into a non-empty property and a value.
    pub fn build(lookup: Option<&Lookup>, values: &[ValueId]) -> Condition {
        let params = || values.iter().map(Param::from).collect::<Vec<_>>();

        match lookup {
            None | Some(Lookup::Equal) | Some(Lookup::Unrecognized(_)) => {
                Condition::IdIn(params())
            }
            Some(Lookup::Contains) => Self::text(TextOp::Contains, params()),
            Some(Lookup::StartsWith) => Self::text(TextOp::StartsWith, params()),
            Some(Lookup::EndsWith) => Self::text(TextOp::EndsWith, params()),
            Some(Lookup::Pattern) => Self::text(TextOp::Like, params()),
            Some(Lookup::Gt) => Self::compare(CompareOp::Gt, params()),
            Some(Lookup::Gte) => Self::compare(CompareOp::Gte, params()),
            Some(Lookup::Lt) => Self::compare(CompareOp::Lt, params()),
            Some(Lookup::Lte) => Self::compare(CompareOp::Lte, params()),
            Some(Lookup::Null) => Condition::IsNull,
            Some(Lookup::NotNull) => Condition::IsNotNull,
            Some(Lookup::Range) => match values {
                [low, high, ..] => Condition::Between {
                    low: Param::from(low),
                    high: Param::from(high),
                },
                _ => Condition::Never,
            },
            Some(Lookup::PropertyValues) => Self::properties(values),
        }
    }

    fn text(op: TextOp, patterns: Vec<Param>) -> Condition {
        Condition::Text { op, patterns }
    }

    fn compare(op: CompareOp, values: Vec<Param>) -> Condition {
        Condition::Compare { op, values }
    }

    fn properties(values: &[ValueId]) -> Condition {
        let mut pairs = Vec::with_capacity(values.len());
        for value in values {
            match split_property(value.as_str()) {
                Some((property, expected)) => {
                    pairs.push((Param::new(property), Param::new(expected)))
                }
                None => return Condition::Never,
            }
        }
        if pairs.is_empty() {
            return Condition::Never;
        }
        Condition::Properties(pairs)
    }
}

/// Split `property=value`. The property must be non-empty.
fn split_property(entry: &str) -> Option<(&str, &str)> {
    let (property, value) = entry.split_once('=')?;
    let property = property.trim();
    if property.is_empty() {
        return None;
    }
    Some((property, value.trim()))
}
