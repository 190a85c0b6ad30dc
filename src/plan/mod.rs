//! Restore planning over incremental backup chains
//!
//! A backup set is an ordered chain of backups: one full base plus zero or
//! more incrementals, each listing only the tables whose data changed since
//! the prior link. This module reads the persisted backup configuration,
//! normalizes legacy configs that predate incrementals, and resolves which
//! backup in the chain is authoritative for each table's data. Metadata is
//! always taken from the target backup; schema is never incremental.
//!
//! The chain is a strict dependency, not a set of independently restorable
//! snapshots: a missing intermediate link or a target that is not the
//! chain's last entry aborts the restore.

mod config;
mod errors;
mod filepath;
mod resolver;

pub use config::{BackupConfig, RestorePlanEntry};
pub use errors::{PlanError, PlanErrorCode, PlanResult};
pub use filepath::FilePathInfo;
pub use resolver::{resolve_restore_plan, verify_backup_set_on_disk, ResolvedBackup};
