//! Backup artifact locators
//!
//! A `FilePathInfo` resolves one backup's timestamp to the concrete paths
//! of its artifacts under the backup directory. Layout:
//!
//! ```text
//! <backup_dir>/<timestamp>/<seg_prefix>_<timestamp>_config.json
//! <backup_dir>/<timestamp>/<seg_prefix>_<timestamp>_toc.json
//! <backup_dir>/<timestamp>/<seg_prefix>_<timestamp>_<section>.sql
//! <backup_dir>/<timestamp>/<seg_prefix>_<timestamp>_data_<oid>.dat
//! ```

use std::path::{Path, PathBuf};

use crate::toc::Section;

/// Opaque locator for one backup's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePathInfo {
    backup_dir: PathBuf,
    timestamp: String,
    seg_prefix: String,
}

impl FilePathInfo {
    pub fn new(backup_dir: &Path, timestamp: &str, seg_prefix: &str) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
            timestamp: timestamp.to_string(),
            seg_prefix: seg_prefix.to_string(),
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn seg_prefix(&self) -> &str {
        &self.seg_prefix
    }

    /// Directory holding every artifact of this backup.
    pub fn backup_directory(&self) -> PathBuf {
        self.backup_dir.join(&self.timestamp)
    }

    fn artifact(&self, suffix: &str) -> PathBuf {
        self.backup_directory()
            .join(format!("{}_{}_{}", self.seg_prefix, self.timestamp, suffix))
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.artifact("config.json")
    }

    pub fn toc_file_path(&self) -> PathBuf {
        self.artifact("toc.json")
    }

    /// Metadata text file for one section.
    pub fn section_file_path(&self, section: Section) -> PathBuf {
        self.artifact(&format!("{}.sql", section))
    }

    /// Data file for one table, keyed by oid.
    pub fn data_file_path(&self, oid: u32) -> PathBuf {
        self.artifact(&format!("data_{}.dat", oid))
    }

    /// Shared data file for single-data-file backups.
    pub fn single_data_file_path(&self) -> PathBuf {
        self.artifact("data.dat")
    }

    /// The paths that must exist and be readable before extraction may
    /// proceed. Per-table data files depend on chain resolution, so
    /// backup-set verification appends them per link.
    pub fn required_paths(&self, metadata_only: bool, single_data_file: bool) -> Vec<PathBuf> {
        let mut paths = vec![self.config_file_path(), self.toc_file_path()];
        for section in Section::all() {
            paths.push(self.section_file_path(section));
        }
        if !metadata_only && single_data_file {
            paths.push(self.single_data_file_path());
        }
        paths
    }
}
