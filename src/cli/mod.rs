//! Command-line interface
//!
//! Offline commands over backup artifacts:
//! - plan: resolve and verify an incremental chain
//! - statements: extract filtered DDL statements for one section
//!
//! The full restore pipeline lives in `restore::run_restore`, behind the
//! catalog and connection seams; drivers supply those.

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use errors::{CliError, CliResult};
