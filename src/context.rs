//! Per-run restore context
//!
//! Everything a restore run shares — backup configuration, the target's
//! index, artifact locations, the capability table, the effective filter
//! set — lives in one value constructed at run start and passed to every
//! component. There are no globals.

use crate::capabilities::Capabilities;
use crate::filters::Filters;
use crate::plan::{
    resolve_restore_plan, BackupConfig, FilePathInfo, PlanResult, ResolvedBackup,
};
use crate::toc::Toc;

/// Shared state of one restore run. The index and configuration are
/// read-only once the context is built.
#[derive(Debug, Clone)]
pub struct RestoreContext {
    pub config: BackupConfig,
    pub toc: Toc,
    pub fp_info: FilePathInfo,
    pub capabilities: Capabilities,
    /// Effective filters after reconciliation and partition expansion.
    pub filters: Filters,
    pub jobs: usize,
    pub on_error_continue: bool,
}

impl RestoreContext {
    /// Resolves the backup set for this run's chain, oldest first.
    pub fn resolve_backup_set(&self) -> PlanResult<Vec<ResolvedBackup>> {
        resolve_restore_plan(
            &self.config.restore_plan,
            self.fp_info.timestamp(),
            self.fp_info.backup_dir(),
            self.fp_info.seg_prefix(),
        )
    }

    /// Every relation the backup set can restore, from the target index.
    /// Metadata always comes from the target, so its index covers the
    /// whole chain.
    pub fn relations_to_restore(&self) -> Vec<String> {
        self.toc.data_entry_fqns()
    }
}
