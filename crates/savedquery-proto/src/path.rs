//! Path metadata.
//!
//! A `QueryPath` connects a source record type to a target record type through
//! a traversal expression written as a node/edge pattern:
//!
//! ```text
//! (s)-[:HAS_ROLE]->(t)
//! (s)-[:MEMBER_OF]->(g)-[:HAS_ROLE]->(t)
//! (s)<-[:OWNS]-(t)
//! ```
//!
//! The first node must be aliased `s` and the last `t`. Intermediate nodes may
//! carry any alias or none.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::{MetaTypeId, PathId};

/// Immutable path metadata, supplied by the path store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPath {
    /// Path identifier.
    pub id: PathId,
    /// Traversal expression from alias `s` to alias `t`.
    pub expression: String,
    /// Record type at the `s` end.
    pub source_type: MetaTypeId,
    /// Record type at the `t` end.
    pub target_type: MetaTypeId,
}

impl QueryPath {
    /// Create path metadata.
    pub fn new(
        id: impl Into<PathId>,
        expression: impl Into<String>,
        source_type: impl Into<MetaTypeId>,
        target_type: impl Into<MetaTypeId>,
    ) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            source_type: source_type.into(),
            target_type: target_type.into(),
        }
    }

    /// Parse the traversal expression.
    pub fn traversal(&self) -> Result<Traversal, ModelError> {
        Traversal::parse(&self.expression)
    }
}

/// Edge direction of a single hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `-[:LABEL]->`
    Outgoing,
    /// `<-[:LABEL]-`
    Incoming,
}

/// One labelled edge step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    /// Edge label.
    pub label: String,
    /// Direction the edge is followed in.
    pub direction: Direction,
}

impl Hop {
    /// An outgoing hop.
    pub fn outgoing(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            direction: Direction::Outgoing,
        }
    }

    /// An incoming hop.
    pub fn incoming(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            direction: Direction::Incoming,
        }
    }
}

/// Parsed traversal expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Traversal {
    /// Hops from `s` to `t`, in order.
    pub hops: Vec<Hop>,
}

impl Traversal {
    /// Parse a traversal expression. Whitespace is ignored.
    pub fn parse(expression: &str) -> Result<Self, ModelError> {
        let text: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

        let (first, mut rest) = take_node(expression, &text)?;
        if first != "s" {
            return Err(ModelError::traversal(
                expression,
                format!("first node must be aliased 's', found '{}'", first),
            ));
        }

        let mut hops = Vec::new();
        let mut last = first;
        while !rest.is_empty() {
            let (hop, after_hop) = take_hop(expression, rest)?;
            let (alias, after_node) = take_node(expression, after_hop)?;
            hops.push(hop);
            last = alias;
            rest = after_node;
        }

        if hops.is_empty() {
            return Err(ModelError::traversal(expression, "no hops"));
        }
        if last != "t" {
            return Err(ModelError::traversal(
                expression,
                format!("last node must be aliased 't', found '{}'", last),
            ));
        }

        Ok(Self { hops })
    }

    /// Whether this is a single `s`→`t` hop.
    pub fn is_single_hop(&self) -> bool {
        self.hops.len() == 1
    }
}

fn take_node<'a>(expression: &str, input: &'a str) -> Result<(&'a str, &'a str), ModelError> {
    let inner = input
        .strip_prefix('(')
        .ok_or_else(|| ModelError::traversal(expression, "expected '('"))?;
    let close = inner
        .find(')')
        .ok_or_else(|| ModelError::traversal(expression, "unterminated node"))?;
    let alias = &inner[..close];
    if !alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ModelError::traversal(
            expression,
            format!("invalid node alias '{}'", alias),
        ));
    }
    Ok((alias, &inner[close + 1..]))
}

fn take_hop<'a>(expression: &str, input: &'a str) -> Result<(Hop, &'a str), ModelError> {
    let (direction, body, terminator) = if let Some(body) = input.strip_prefix("<-[") {
        (Direction::Incoming, body, "]-")
    } else if let Some(body) = input.strip_prefix("-[") {
        (Direction::Outgoing, body, "]->")
    } else {
        return Err(ModelError::traversal(expression, "expected an edge"));
    };

    let end = body
        .find(terminator)
        .ok_or_else(|| ModelError::traversal(expression, "unterminated edge"))?;
    let label = body[..end]
        .strip_prefix(':')
        .ok_or_else(|| ModelError::traversal(expression, "edge label must start with ':'"))?;
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ModelError::traversal(
            expression,
            format!("invalid edge label '{}'", label),
        ));
    }

    Ok((
        Hop {
            label: label.to_string(),
            direction,
        },
        &body[end + terminator.len()..],
    ))
}
