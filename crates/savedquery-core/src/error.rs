//! Core error types.

use thiserror::Error;

use savedquery_proto::{ModelError, PathId, ValueId};

use crate::cache::CacheError;
use crate::store::StoreError;

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced `QueryPath` could not be resolved.
    #[error("path {path} could not be resolved")]
    PathResolution {
        /// The unresolved path.
        path: PathId,
    },

    /// Path metadata exists but cannot be interpreted.
    #[error("invalid path metadata: {0}")]
    Model(#[from] ModelError),

    /// A value clause is malformed.
    #[error("invalid value clause {value}: {reason}")]
    InvalidValue {
        /// The offending clause.
        value: ValueId,
        /// What was wrong with it.
        reason: String,
    },

    /// The store raised while running a statement.
    #[error("execution error: {0}")]
    Execution(#[from] StoreError),

    /// A read session could not be opened.
    #[error("session error: {0}")]
    Session(String),

    /// Cache subsystem failure. Never surfaced by the facade.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The store returned something the engine did not ask for.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
