//! Extraction error types
//!
//! An extraction failure means the artifacts and the index disagree, which
//! is never recoverable mid-restore; every code here is FATAL.

use std::fmt;
use std::io;

/// Extraction error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorCode {
    /// Artifact could not be opened or read.
    SbkExtractIo,
    /// Entry byte range exceeds the artifact's length.
    SbkExtractRange,
    /// Sliced bytes are not valid UTF-8.
    SbkExtractEncoding,
}

impl ExtractErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractErrorCode::SbkExtractIo => "SBK_EXTRACT_IO",
            ExtractErrorCode::SbkExtractRange => "SBK_EXTRACT_RANGE",
            ExtractErrorCode::SbkExtractEncoding => "SBK_EXTRACT_ENCODING",
        }
    }
}

impl fmt::Display for ExtractErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extraction error with full context.
#[derive(Debug)]
pub struct ExtractError {
    code: ExtractErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl ExtractError {
    fn new(code: ExtractErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(ExtractErrorCode::SbkExtractIo, message, Some(source))
    }

    pub fn io_error_at_path(path: &std::path::Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ExtractErrorCode::SbkExtractRange, message, None)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ExtractErrorCode::SbkExtractEncoding, message, None)
    }

    pub fn code(&self) -> ExtractErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extraction errors always abort the restore.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
