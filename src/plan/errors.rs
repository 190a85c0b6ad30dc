//! Plan-resolution error types
//!
//! Chain errors are structural: restoring from a broken or misordered
//! chain would silently lose data, so every code here is FATAL.

use std::fmt;
use std::io;

/// Plan error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanErrorCode {
    /// Requested timestamp is not the chain's last entry.
    SbkPlanTargetMismatch,
    /// A chain link's artifacts are missing or unreadable on disk.
    SbkPlanMissingLink,
    /// Chain timestamps are malformed or not strictly increasing.
    SbkPlanChainOrder,
    /// Backup configuration could not be read or written.
    SbkPlanConfigIo,
    /// Backup configuration is not valid JSON or fails checks.
    SbkPlanConfigFormat,
    /// Backup was taken by an incompatible tool version.
    SbkPlanVersion,
}

impl PlanErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanErrorCode::SbkPlanTargetMismatch => "SBK_PLAN_TARGET_MISMATCH",
            PlanErrorCode::SbkPlanMissingLink => "SBK_PLAN_MISSING_LINK",
            PlanErrorCode::SbkPlanChainOrder => "SBK_PLAN_CHAIN_ORDER",
            PlanErrorCode::SbkPlanConfigIo => "SBK_PLAN_CONFIG_IO",
            PlanErrorCode::SbkPlanConfigFormat => "SBK_PLAN_CONFIG_FORMAT",
            PlanErrorCode::SbkPlanVersion => "SBK_PLAN_VERSION",
        }
    }
}

impl fmt::Display for PlanErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan error with full context.
#[derive(Debug)]
pub struct PlanError {
    code: PlanErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl PlanError {
    fn new(code: PlanErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn target_mismatch(message: impl Into<String>) -> Self {
        Self::new(PlanErrorCode::SbkPlanTargetMismatch, message, None)
    }

    pub fn missing_link(message: impl Into<String>) -> Self {
        Self::new(PlanErrorCode::SbkPlanMissingLink, message, None)
    }

    pub fn missing_link_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(PlanErrorCode::SbkPlanMissingLink, message, Some(source))
    }

    pub fn chain_order(message: impl Into<String>) -> Self {
        Self::new(PlanErrorCode::SbkPlanChainOrder, message, None)
    }

    pub fn config_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(PlanErrorCode::SbkPlanConfigIo, message, Some(source))
    }

    pub fn config_format(message: impl Into<String>) -> Self {
        Self::new(PlanErrorCode::SbkPlanConfigFormat, message, None)
    }

    pub fn version(message: impl Into<String>) -> Self {
        Self::new(PlanErrorCode::SbkPlanVersion, message, None)
    }

    pub fn code(&self) -> PlanErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Plan errors always abort the restore.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PlanErrorCode::SbkPlanTargetMismatch.as_str(),
            "SBK_PLAN_TARGET_MISMATCH"
        );
        assert_eq!(
            PlanErrorCode::SbkPlanMissingLink.as_str(),
            "SBK_PLAN_MISSING_LINK"
        );
        assert_eq!(
            PlanErrorCode::SbkPlanChainOrder.as_str(),
            "SBK_PLAN_CHAIN_ORDER"
        );
    }

    #[test]
    fn test_plan_errors_are_fatal() {
        assert!(PlanError::target_mismatch("bad target").is_fatal());
        assert!(PlanError::missing_link("gone").is_fatal());
        assert!(PlanError::chain_order("duplicated timestamp").is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = PlanError::missing_link("backup 20260101000000 has no index at /tmp/x");
        let display = format!("{}", err);
        assert!(display.contains("FATAL"));
        assert!(display.contains("SBK_PLAN_MISSING_LINK"));
        assert!(display.contains("20260101000000"));
    }
}
