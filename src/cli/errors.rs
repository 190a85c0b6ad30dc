//! CLI error types

use thiserror::Error;

use crate::restore::RestoreFailure;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Restore(#[from] RestoreFailure),

    #[error("unknown section '{0}'; expected predata, data, postdata or global")]
    UnknownSection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_section_message() {
        let err = CliError::UnknownSection("middata".to_string());
        assert!(format!("{}", err).contains("middata"));
    }
}
