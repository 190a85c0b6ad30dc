//! Command implementations

use crate::extract::statements_for_section;
use crate::filters::Filters;
use crate::plan::verify_backup_set_on_disk;
use crate::restore::{load_context, RestoreOptions};
use crate::toc::Section;

use super::args::{BackupLocation, Cli, Command};
use super::errors::{CliError, CliResult};

/// Parses arguments and dispatches.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Plan { location } => plan(&location),
        Command::Statements {
            location,
            section,
            include_schemas,
            exclude_schemas,
            include_relations,
            exclude_relations,
        } => {
            let filters = Filters::new(
                &include_schemas,
                &exclude_schemas,
                &include_relations,
                &exclude_relations,
            );
            statements(&location, &section, &filters)
        }
    }
}

fn options_for(location: &BackupLocation, filters: Filters) -> RestoreOptions {
    RestoreOptions {
        backup_dir: location.backup_dir.clone(),
        timestamp: location.timestamp.clone(),
        seg_prefix: location.seg_prefix.clone(),
        jobs: 1,
        on_error_continue: false,
        filters,
        target_db_version: None,
    }
}

fn plan(location: &BackupLocation) -> CliResult<()> {
    let ctx = load_context(&options_for(location, Filters::none()))?;
    let backup_set = ctx.resolve_backup_set().map_err(crate::restore::RestoreFailure::from)?;
    verify_backup_set_on_disk(&backup_set, &ctx.config, &ctx.toc)
        .map_err(crate::restore::RestoreFailure::from)?;

    for resolved in &backup_set {
        println!(
            "{}: authoritative for {} table(s)",
            resolved.fp_info.timestamp(),
            resolved.tables.len()
        );
        for table in &resolved.tables {
            println!("  {}", table);
        }
    }
    Ok(())
}

fn statements(location: &BackupLocation, section: &str, filters: &Filters) -> CliResult<()> {
    let section = parse_section(section)?;
    let ctx = load_context(&options_for(location, filters.clone()))?;
    let statements = statements_for_section(&ctx.toc, &ctx.fp_info, section, &[], &[], filters)
        .map_err(crate::restore::RestoreFailure::from)?;

    for statement in &statements {
        print!("{}", statement.statement);
    }
    Ok(())
}

fn parse_section(name: &str) -> CliResult<Section> {
    match name {
        "predata" => Ok(Section::Predata),
        "data" => Ok(Section::Data),
        "postdata" => Ok(Section::Postdata),
        "global" => Ok(Section::Global),
        other => Err(CliError::UnknownSection(other.to_string())),
    }
}
