//! Error types for the binding

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{HandleKind, ObjectId, SequenceId};

/// Error reported by the server through the core error event.
///
/// These are buffered, not raised: they surface at the next barrier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreError {
    /// Object the error relates to
    pub id: ObjectId,
    /// Sequence number of the request that failed, as reported
    pub seq: SequenceId,
    /// Negative errno-style code
    pub code: i32,
    pub message: String,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "object {} (seq {}): {} [code {}]",
            self.id, self.seq, self.message, self.code
        )
    }
}

/// Binding errors
#[derive(Error, Debug)]
pub enum TetherError {
    // Lifecycle errors
    #[error("Foreign constructor for {kind} returned null")]
    ForeignConstruction { kind: HandleKind },

    #[error("Foreign call {op} failed with code {code}")]
    ForeignCall { op: &'static str, code: i32 },

    #[error("Library already initialized")]
    AlreadyInitialized,

    #[error("Library not initialized")]
    NotInitialized,

    // Loop errors
    #[error("Loop is already being pumped by this instance")]
    Reentrant,

    #[error("Barrier {seq} interrupted before the server completed it")]
    Interrupted { seq: SequenceId },

    #[error("Server reported {} error(s): {}", .0.len(), join_errors(.0))]
    Core(Vec<CoreError>),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TetherError {
    /// Server errors carried by a failed barrier, if that is what this is
    pub fn core_errors(&self) -> Option<&[CoreError]> {
        match self {
            TetherError::Core(errors) => Some(errors),
            _ => None,
        }
    }
}

fn join_errors(errors: &[CoreError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for binding operations
pub type TetherResult<T> = Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = TetherError::Core(vec![
            CoreError {
                id: ObjectId(3),
                seq: SequenceId(9),
                code: -2,
                message: "no such node".into(),
            },
            CoreError {
                id: ObjectId(0),
                seq: SequenceId(10),
                code: -22,
                message: "invalid".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("Server reported 2 error(s)"));
        assert!(text.contains("object 3 (seq 9): no such node [code -2]"));
        assert_eq!(err.core_errors().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_construction_error_names_kind() {
        let err = TetherError::ForeignConstruction {
            kind: HandleKind::Context,
        };
        assert_eq!(err.to_string(), "Foreign constructor for context returned null");
        assert!(err.core_errors().is_none());
    }
}
