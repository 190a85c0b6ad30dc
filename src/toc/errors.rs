//! Index-specific error types
//!
//! Index errors are structural: a malformed or out-of-order index cannot be
//! restored from, so every code here is FATAL and aborts the run.

use std::fmt;
use std::io;

/// Index error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocErrorCode {
    /// Entry breaks the append-only cursor contract.
    SbkTocOrder,
    /// Index file could not be read or written.
    SbkTocIo,
    /// Index file is not valid JSON or fails structural checks.
    SbkTocFormat,
}

impl TocErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TocErrorCode::SbkTocOrder => "SBK_TOC_ORDER",
            TocErrorCode::SbkTocIo => "SBK_TOC_IO",
            TocErrorCode::SbkTocFormat => "SBK_TOC_FORMAT",
        }
    }
}

impl fmt::Display for TocErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index error with full context.
#[derive(Debug)]
pub struct TocError {
    code: TocErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl TocError {
    fn new(code: TocErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// Creates an ordering violation error.
    pub fn order(message: impl Into<String>) -> Self {
        Self::new(TocErrorCode::SbkTocOrder, message, None)
    }

    /// Creates an I/O error.
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(TocErrorCode::SbkTocIo, message, Some(source))
    }

    /// Creates an I/O error at a specific path.
    pub fn io_error_at_path(path: &std::path::Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::new(TocErrorCode::SbkTocFormat, message, None)
    }

    pub fn code(&self) -> TocErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Index errors always abort the restore.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for TocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for TocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for index operations.
pub type TocResult<T> = Result<T, TocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TocErrorCode::SbkTocOrder.as_str(), "SBK_TOC_ORDER");
        assert_eq!(TocErrorCode::SbkTocIo.as_str(), "SBK_TOC_IO");
        assert_eq!(TocErrorCode::SbkTocFormat.as_str(), "SBK_TOC_FORMAT");
    }

    #[test]
    fn test_all_toc_errors_are_fatal() {
        assert!(TocError::order("out of order").is_fatal());
        assert!(TocError::format("bad json").is_fatal());
    }

    #[test]
    fn test_display_contains_code_and_message() {
        let err = TocError::order("entry starts at 10, cursor at 20");
        let display = format!("{}", err);
        assert!(display.contains("FATAL"));
        assert!(display.contains("SBK_TOC_ORDER"));
        assert!(display.contains("cursor at 20"));
    }

    #[test]
    fn test_error_with_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = TocError::io_error("could not open index", io_err);
        let display = format!("{}", err);
        assert!(display.contains("caused by"));
        assert!(display.contains("no such file"));
    }
}
