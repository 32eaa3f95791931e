//! Error types for the shelf engine.

use crate::{DocumentId, TypeId, Version};
use thiserror::Error;

/// All possible errors from the shelf engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Input errors
    #[error("syntax error: {message} at '{fragment}'")]
    Syntax { message: String, fragment: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    // Store errors
    #[error("object {id} of type {type_id} not found")]
    NotFound { type_id: TypeId, id: DocumentId },

    #[error("version mismatch: expected {expected}, got {actual}")]
    ConcurrentModification { expected: Version, actual: Version },

    #[error("referenced {type_id} '{identifier}' not found")]
    ReferenceNotFound {
        type_id: TypeId,
        identifier: String,
    },

    // Evaluation faults
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl Error {
    /// Build a syntax error for the given source fragment.
    pub fn syntax(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Error::Syntax {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    /// Whether the error was caused by malformed caller input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::Syntax { .. } | Error::InvalidInput(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::syntax("unexpected token", ")");
        assert_eq!(err.to_string(), "syntax error: unexpected token at ')'");

        let err = Error::ConcurrentModification {
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.to_string(), "version mismatch: expected 1, got 2");

        let err = Error::NotFound {
            type_id: "cart".into(),
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "object abc of type cart not found");
    }

    #[test]
    fn input_classification() {
        assert!(Error::syntax("x", "y").is_invalid_input());
        assert!(Error::InvalidInput("bad".into()).is_invalid_input());
        assert!(!Error::Evaluation("boom".into()).is_invalid_input());
        assert!(!Error::ConcurrentModification {
            expected: 1,
            actual: 2
        }
        .is_invalid_input());
    }
}
