//! Savedquery model types.
//!
//! This crate defines the structured, already-validated query objects that the
//! execution engine in `savedquery-core` evaluates.
//!
//! # Modules
//!
//! - [`ids`] - String-backed identifier newtypes
//! - [`lookup`] - Lookup operators for value clauses
//! - [`path`] - Path metadata and traversal expressions
//! - [`query`] - Composable `Query` / `QueryValue` definitions
//! - [`error`] - Model error types

pub mod error;
pub mod ids;
pub mod lookup;
pub mod path;
pub mod query;

pub use error::ModelError;
pub use ids::{MetaTypeId, PathId, QueryId, RecordId, ValueId};
pub use lookup::{is_equality, Lookup};
pub use path::{Direction, Hop, QueryPath, Traversal};
pub use query::{MatchMode, Polarity, Query, QueryValue};
