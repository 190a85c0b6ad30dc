//! Restore orchestration
//!
//! Drives one restore run end to end: load and normalize the backup
//! configuration, resolve the incremental chain, reconcile against the
//! target's existing state, then execute schemas, predata, data loads,
//! and postdata in strict order across the connection pool.
//!
//! Failures split two ways. Structural problems (broken chain, bad index,
//! out-of-range entry) abort the run with full context before or during
//! extraction. Per-object execution errors are governed by the error
//! policy and reported in the final report. Nothing is retried here;
//! recovery is an operator re-run, which reconciliation makes idempotent.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::capabilities::Capabilities;
use crate::context::RestoreContext;
use crate::engine::{
    ConnectionFactory, EngineError, ErrorPolicy, ExecError, ExecutionEngine, ExecutionSummary,
};
use crate::extract::{statements_for_section, ExtractError, StatementWithType};
use crate::filters::{expand_partition_roots, filter_relations, FilterError, Filters};
use crate::observability::Logger;
use crate::plan::{verify_backup_set_on_disk, BackupConfig, FilePathInfo, PlanError};
use crate::reconcile::{build_restore_metadata_filters, CatalogError, CatalogSource, ExistingState};
use crate::toc::{schema_of, Section, Toc, TocError};

/// Options for one restore run, as parsed from the command line.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub backup_dir: PathBuf,
    pub timestamp: String,
    pub seg_prefix: String,
    pub jobs: usize,
    /// Count per-object failures instead of stopping on the first one.
    pub on_error_continue: bool,
    /// User-supplied filters; reconciliation refines them.
    pub filters: Filters,
    /// Version of the target cluster when known; defaults to the version
    /// the backup was taken from.
    pub target_db_version: Option<String>,
}

/// Outcome of one restore run.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub schemas: ExecutionSummary,
    pub predata: ExecutionSummary,
    pub data: ExecutionSummary,
    pub postdata: ExecutionSummary,
    /// Statements completed across all phases, successes and recorded
    /// failures alike.
    pub statements_completed: usize,
}

impl RestoreReport {
    pub fn total_errors(&self) -> usize {
        self.schemas.error_count()
            + self.predata.error_count()
            + self.data.error_count()
            + self.postdata.error_count()
    }
}

/// A restore run that could not proceed or complete.
#[derive(Debug, Error)]
pub enum RestoreFailure {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Toc(#[from] TocError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to acquire connections: {0}")]
    Acquire(ExecError),
    #[error("session setup failed: {0}")]
    SessionSetup(ExecError),
}

/// Loads and normalizes everything a run needs from the backup artifacts.
/// No connection is touched here.
pub fn load_context(options: &RestoreOptions) -> Result<RestoreContext, RestoreFailure> {
    options.filters.validate()?;

    let fp_info = FilePathInfo::new(&options.backup_dir, &options.timestamp, &options.seg_prefix);
    let mut config = BackupConfig::read_from_file(&fp_info.config_file_path())?;
    config.ensure_backup_version_compatible(env!("CARGO_PKG_VERSION"))?;

    let toc = Toc::read_from_file(&fp_info.toc_file_path())?;
    config.normalize_legacy_plan(&toc, &options.timestamp);

    let target_version = options
        .target_db_version
        .clone()
        .unwrap_or_else(|| config.database_version.clone());
    let capabilities = Capabilities::for_versions(&target_version, &config.database_version);

    Ok(RestoreContext {
        config,
        toc,
        fp_info,
        capabilities,
        filters: options.filters.clone(),
        jobs: options.jobs,
        on_error_continue: options.on_error_continue,
    })
}

/// Runs a restore end to end.
pub fn run_restore(
    options: &RestoreOptions,
    catalog: &mut dyn CatalogSource,
    factory: &mut dyn ConnectionFactory,
) -> Result<RestoreReport, RestoreFailure> {
    let mut ctx = load_context(options)?;
    Logger::info(
        "RESTORE_START",
        &[
            ("timestamp", ctx.fp_info.timestamp()),
            ("database_version", ctx.config.database_version.as_str()),
        ],
    );

    let backup_set = ctx.resolve_backup_set()?;
    verify_backup_set_on_disk(&backup_set, &ctx.config, &ctx.toc)?;

    // Discovery uses its own connection, acquired and released before the
    // execution pool exists.
    let existing = ExistingState::discover(catalog)?;

    // Any included leaf partition pulls in its root; root DDL is a
    // prerequisite for the child's restore.
    let child_to_root = ctx.toc.child_to_root();
    let mut user_filters = options.filters.clone();
    if !user_filters.include_relations.is_empty() {
        user_filters.include_relations =
            expand_partition_roots(&user_filters.include_relations, &child_to_root);
    }

    let relations = ctx.relations_to_restore();
    let mut effective = build_restore_metadata_filters(&relations, &existing, &user_filters);
    if !effective.include_relations.is_empty() {
        effective.include_relations =
            expand_partition_roots(&effective.include_relations, &child_to_root);
        for relation in &effective.include_relations {
            let schema = schema_of(relation);
            if !effective.include_schemas.is_empty()
                && !effective.include_schemas.iter().any(|s| s == schema)
            {
                effective.include_schemas.push(schema.to_string());
            }
        }
    }
    ctx.filters = effective;

    let mut pool = factory
        .acquire(ctx.jobs)
        .map_err(RestoreFailure::Acquire)?;
    let setup_sql = ctx.capabilities.session_setup_sql();
    for conn in pool.iter_mut() {
        conn.exec(&setup_sql).map_err(RestoreFailure::SessionSetup)?;
    }

    let policy = if ctx.on_error_continue {
        ErrorPolicy::ContinueAndCount
    } else {
        ErrorPolicy::FailFast
    };
    let engine = ExecutionEngine::new(policy);
    let mut report = RestoreReport::default();

    // Session-level settings from the global section, on every connection.
    let guc_statements = statements_for_section(
        &ctx.toc,
        &ctx.fp_info,
        Section::Global,
        &["SESSION GUCS"],
        &[],
        &Filters::none(),
    )?;
    for conn in pool.iter_mut() {
        for statement in &guc_statements {
            conn.exec(&statement.statement)
                .map_err(RestoreFailure::SessionSetup)?;
        }
    }

    // Schemas first, serially, tolerant of pre-existing ones.
    let schema_statements = statements_for_section(
        &ctx.toc,
        &ctx.fp_info,
        Section::Predata,
        &["SCHEMA"],
        &[],
        &ctx.filters,
    )?;
    report.schemas = engine.restore_schemas(&schema_statements, pool[0].as_mut());
    Logger::info(
        "SCHEMAS_COMPLETE",
        &[("errors", report.schemas.error_count().to_string().as_str())],
    );

    // Predata, fully before any data load.
    let predata_statements = statements_for_section(
        &ctx.toc,
        &ctx.fp_info,
        Section::Predata,
        &[],
        &["SCHEMA", "SESSION GUCS"],
        &ctx.filters,
    )?;
    report.predata = engine.execute(&predata_statements, &mut pool)?;
    Logger::info(
        "PREDATA_COMPLETE",
        &[("errors", report.predata.error_count().to_string().as_str())],
    );

    // Data, per chain link, oldest first. Filters here are the user's,
    // not the reconciled ones: data loads into tables that already
    // existed just as well as into freshly created ones.
    if !ctx.config.metadata_only {
        let oid_of: HashMap<String, u32> = ctx
            .toc
            .data_entries
            .iter()
            .map(|entry| (entry.fqn(), entry.oid))
            .collect();
        for resolved in &backup_set {
            let tables = filter_relations(&resolved.tables, &user_filters);
            let loads = data_load_statements(&tables, &oid_of, resolved, &ctx.config);
            let summary = engine.execute(&loads, &mut pool)?;
            Logger::info(
                "DATA_LINK_COMPLETE",
                &[
                    ("timestamp", resolved.fp_info.timestamp()),
                    ("tables", tables.len().to_string().as_str()),
                ],
            );
            report.data.attempted += summary.attempted;
            report.data.failures.extend(summary.failures);
        }
    }

    // Postdata only after every data load finished.
    let postdata_statements = statements_for_section(
        &ctx.toc,
        &ctx.fp_info,
        Section::Postdata,
        &[],
        &[],
        &ctx.filters,
    )?;
    report.postdata = engine.execute(&postdata_statements, &mut pool)?;

    report.statements_completed = engine.progress();
    Logger::info(
        "RESTORE_COMPLETE",
        &[
            ("statements", report.statements_completed.to_string().as_str()),
            ("errors", report.total_errors().to_string().as_str()),
        ],
    );
    Ok(report)
}

/// Builds the bulk-load statement for each table a chain link is
/// authoritative for. Each table is its own dependency group, so loads
/// spread freely across the pool.
fn data_load_statements(
    tables: &[String],
    oid_of: &HashMap<String, u32>,
    resolved: &crate::plan::ResolvedBackup,
    config: &BackupConfig,
) -> Vec<StatementWithType> {
    let mut statements = Vec::with_capacity(tables.len());
    for fqn in tables {
        let Some(oid) = oid_of.get(fqn) else {
            // Dropped between this link and the target backup; the target
            // index no longer knows it.
            Logger::verbose("DATA_TABLE_SKIPPED", &[("table", fqn.as_str())]);
            continue;
        };
        let path = if config.single_data_file {
            resolved.fp_info.single_data_file_path()
        } else {
            resolved.fp_info.data_file_path(*oid)
        };
        let (schema, name) = match fqn.split_once('.') {
            Some((schema, name)) => (schema.to_string(), name.to_string()),
            None => (String::new(), fqn.clone()),
        };
        statements.push(StatementWithType {
            statement: format!("COPY {} FROM '{}' WITH CSV;", fqn, path.display()),
            object_type: "TABLE DATA".to_string(),
            schema,
            name,
            reference_object: None,
        });
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ResolvedBackup;
    use std::path::Path;

    #[test]
    fn test_data_load_statements_key_paths_by_oid() {
        let mut oid_of = HashMap::new();
        oid_of.insert("s1.t1".to_string(), 16384u32);
        let resolved = ResolvedBackup {
            fp_info: FilePathInfo::new(Path::new("/backups"), "20260815120000", "seg0"),
            tables: vec!["s1.t1".to_string()],
        };
        let config = BackupConfig {
            database_version: "6.19.0".to_string(),
            backup_version: "0.1.0".to_string(),
            metadata_only: false,
            single_data_file: false,
            restore_plan: Vec::new(),
        };

        let loads = data_load_statements(&resolved.tables, &oid_of, &resolved, &config);
        assert_eq!(loads.len(), 1);
        assert!(loads[0].statement.contains("COPY s1.t1"));
        assert!(loads[0].statement.contains("data_16384.dat"));
        assert_eq!(loads[0].object_type, "TABLE DATA");
    }

    #[test]
    fn test_unknown_tables_are_skipped() {
        let oid_of = HashMap::new();
        let resolved = ResolvedBackup {
            fp_info: FilePathInfo::new(Path::new("/backups"), "20260815120000", "seg0"),
            tables: vec!["s1.gone".to_string()],
        };
        let config = BackupConfig {
            database_version: "6.19.0".to_string(),
            backup_version: "0.1.0".to_string(),
            metadata_only: false,
            single_data_file: true,
            restore_plan: Vec::new(),
        };
        let loads = data_load_statements(&resolved.tables, &oid_of, &resolved, &config);
        assert!(loads.is_empty());
    }
}
