//! Engine error types

use thiserror::Error;

use super::connection::ExecError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures surfaced by the execution engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The pool has no connections; nothing can run.
    #[error("connection pool is empty")]
    EmptyPool,

    /// First failure under the fail-fast policy.
    #[error("statement for {object_type} {object} failed: {source}")]
    StatementFailed {
        object_type: String,
        object: String,
        source: ExecError,
    },
}
