//! Observability for backup and restore runs
//!
//! Structured JSON logging only: one line per event, synchronous, no
//! buffering and no background threads. Logging is read-only with respect
//! to execution; nothing here ever influences scheduling or outcomes.

mod logger;

pub use logger::{Logger, Severity};
