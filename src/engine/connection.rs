//! Connection seam
//!
//! The engine never talks to a driver directly. A restore acquires M
//! long-lived connections once, up front, and keeps them for the whole
//! run; no statement suspends cooperatively and connections are not
//! safely interruptible mid-statement.

use thiserror::Error;

/// Error from executing one statement against the target database.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecError {
    pub message: String,
}

impl ExecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The connection seam carries no SQLSTATE, so already-exists is
    /// recognized by message, as the server phrases it.
    pub fn is_already_exists(&self) -> bool {
        self.message.contains("already exists")
    }
}

/// Result type for statement execution.
pub type ExecResult = Result<(), ExecError>;

/// One live database connection. Execution is synchronous; `exec` returns
/// only when the server has accepted or rejected the statement.
pub trait DbConnection: Send {
    fn exec(&mut self, sql: &str) -> ExecResult;
}

/// Produces the connection pool for one run.
pub trait ConnectionFactory {
    fn acquire(&mut self, n: usize) -> Result<Vec<Box<dyn DbConnection>>, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_detection() {
        assert!(ExecError::new("schema \"s1\" already exists").is_already_exists());
        assert!(!ExecError::new("permission denied for schema s1").is_already_exists());
    }
}
