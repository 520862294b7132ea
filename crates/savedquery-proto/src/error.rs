//! Model error types.

use thiserror::Error;

/// Errors raised while interpreting model metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A traversal expression could not be parsed.
    #[error("invalid traversal expression '{expression}': {reason}")]
    InvalidTraversal {
        /// The offending expression.
        expression: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ModelError {
    pub(crate) fn traversal(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTraversal {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::traversal("(s)->", "missing label");
        assert!(err.to_string().contains("(s)->"));
        assert!(err.to_string().contains("missing label"));
    }
}
