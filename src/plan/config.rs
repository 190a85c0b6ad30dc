//! Persisted backup configuration
//!
//! One JSON record per backup, written at backup end and read once at
//! restore start. Carries the versions the backup was taken with, the
//! backup shape flags, and the restore plan chain. Immutable after load
//! apart from legacy normalization.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::toc::Toc;

use super::errors::{PlanError, PlanResult};

/// Timestamp layout used for backup identifiers.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One link of an incremental chain: the tables whose data changed as of
/// `timestamp` relative to earlier links. The first link is the base and
/// covers every table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePlanEntry {
    pub timestamp: String,
    pub changed_tables: Vec<String>,
}

/// Backup configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Version of the database the backup was taken from.
    pub database_version: String,

    /// Version of the backup tool that produced the artifacts.
    pub backup_version: String,

    /// True when the backup carries no table data.
    pub metadata_only: bool,

    /// True when all table data shares one data file per segment.
    pub single_data_file: bool,

    /// Incremental chain, oldest first. Empty for legacy backups.
    #[serde(default)]
    pub restore_plan: Vec<RestorePlanEntry>,
}

impl BackupConfig {
    /// Serializes the config to JSON.
    pub fn to_json(&self) -> PlanResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PlanError::config_format(format!("failed to serialize config: {}", e)))
    }

    /// Deserializes a config from JSON.
    pub fn from_json(json: &str) -> PlanResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlanError::config_format(format!("failed to parse config: {}", e)))
    }

    /// Writes the config to a file with fsync.
    pub fn write_to_file(&self, path: &Path) -> PlanResult<()> {
        let json = self.to_json()?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    PlanError::config_io(
                        format!("failed to create config directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let mut file = File::create(path).map_err(|e| {
            PlanError::config_io(format!("failed to create {}", path.display()), e)
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| PlanError::config_io(format!("failed to write {}", path.display()), e))?;
        file.sync_all()
            .map_err(|e| PlanError::config_io(format!("failed to fsync {}", path.display()), e))?;
        Ok(())
    }

    /// Reads a config from a file.
    pub fn read_from_file(path: &Path) -> PlanResult<Self> {
        let mut file = File::open(path)
            .map_err(|e| PlanError::config_io(format!("failed to open {}", path.display()), e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PlanError::config_io(format!("failed to read {}", path.display()), e))?;
        Self::from_json(&contents)
    }

    /// Gives a legacy backup (taken before incrementals existed) a restore
    /// plan: one base entry at the backup's own timestamp covering every
    /// table the index has data for. No-op when a plan is present.
    pub fn normalize_legacy_plan(&mut self, toc: &Toc, backup_timestamp: &str) {
        if self.restore_plan.is_empty() {
            self.restore_plan = vec![RestorePlanEntry {
                timestamp: backup_timestamp.to_string(),
                changed_tables: toc.data_entry_fqns(),
            }];
        }
    }

    /// Checks that the backup was produced by a tool no newer than this one.
    pub fn ensure_backup_version_compatible(&self, tool_version: &str) -> PlanResult<()> {
        let backup = parse_version(&self.backup_version)?;
        let tool = parse_version(tool_version)?;
        if backup > tool {
            return Err(PlanError::version(format!(
                "backup was taken with version {} but this tool is version {}",
                self.backup_version, tool_version
            )));
        }
        Ok(())
    }
}

/// Parses a `major.minor.patch` version string.
fn parse_version(version: &str) -> PlanResult<(u32, u32, u32)> {
    let mut parts = version.split('.');
    let mut next = |label: &str| -> PlanResult<u32> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| {
                PlanError::config_format(format!("malformed {} in version '{}'", label, version))
            })
    };
    Ok((next("major")?, next("minor")?, next("patch")?))
}

/// Validates a backup timestamp string.
pub fn parse_timestamp(timestamp: &str) -> PlanResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| PlanError::chain_order(format!("bad timestamp '{}': {}", timestamp, e)))
}
