//! Database version capability table
//!
//! Built once at startup from the target's version and the version the
//! backup was taken from, then consulted by name. Call sites never branch
//! on raw version strings.

use std::fmt;

/// Version-dependent behavior for one restore run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Target accepts `SET lock_timeout`.
    pub lock_timeout: bool,

    /// Target spells `allow_system_table_mods` as a boolean; older
    /// releases take the mode string 'DML'.
    pub system_table_mods_boolean: bool,

    /// Data was hashed with pre-6 operators and the target must load it
    /// with legacy hash operators or distribution will not match.
    pub needs_legacy_hashops: bool,

    /// Line-length cap to set for CSV loads, absent where the target no
    /// longer limits it.
    pub max_csv_line_length: Option<u64>,
}

impl Capabilities {
    /// Builds the table from the target database's version and the
    /// database version recorded in the backup configuration.
    pub fn for_versions(target_version: &str, backup_database_version: &str) -> Self {
        let target = major_minor(target_version);
        let backup = major_minor(backup_database_version);

        let max_csv_line_length = if target.0 >= 6 {
            None
        } else if (target.0 == 4 && target >= (4, 3)) || (target.0 == 5 && target >= (5, 11)) {
            Some(1024 * 1024 * 1024)
        } else {
            Some(4 * 1024 * 1024)
        };

        Self {
            lock_timeout: target.0 >= 6,
            system_table_mods_boolean: target.0 >= 6,
            needs_legacy_hashops: target.0 >= 6 && backup.0 < 6,
            max_csv_line_length,
        }
    }

    /// Session setup statements run once on every pooled connection before
    /// any restore statement.
    pub fn session_setup_sql(&self) -> String {
        let mut sql = String::from(
            "SET application_name TO 'shardback';\n\
             SET search_path TO pg_catalog;\n\
             SET statement_timeout = 0;\n\
             SET check_function_bodies = false;\n\
             SET client_min_messages = error;\n\
             SET standard_conforming_strings = on;\n",
        );
        if self.system_table_mods_boolean {
            sql.push_str("SET allow_system_table_mods = true;\n");
        } else {
            sql.push_str("SET allow_system_table_mods = 'DML';\n");
        }
        if self.lock_timeout {
            sql.push_str("SET lock_timeout = 0;\n");
            sql.push_str("SET default_transaction_read_only = off;\n");
        }
        if self.needs_legacy_hashops {
            sql.push_str("SET use_legacy_hashops = on;\n");
        }
        if let Some(limit) = self.max_csv_line_length {
            sql.push_str(&format!("SET max_csv_line_length = {};\n", limit));
        }
        sql
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lock_timeout={} legacy_hashops={}",
            self.lock_timeout, self.needs_legacy_hashops
        )
    }
}

/// Best-effort `(major, minor)` from a version string; unparseable parts
/// read as zero, which selects the most conservative behavior.
fn major_minor(version: &str) -> (u32, u32) {
    let mut parts = version.split(['.', ' ']);
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}
