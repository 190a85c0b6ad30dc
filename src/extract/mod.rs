//! Statement extraction from backup metadata files
//!
//! Slices the DDL text at the byte ranges the index records, producing one
//! statement value per surviving entry. No text parsing: the byte ranges
//! are the only source of statement boundaries. Output order equals index
//! insertion order, which is the system's only intra-section ordering
//! contract.

mod errors;

pub use errors::{ExtractError, ExtractErrorCode, ExtractResult};

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::filters::Filters;
use crate::plan::FilePathInfo;
use crate::toc::{MetadataEntry, Section, Toc};

/// One extracted DDL statement with the identity of its object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementWithType {
    pub statement: String,
    pub object_type: String,
    pub schema: String,
    pub name: String,
    /// Owning relation for dependent objects; execution keeps statements
    /// sharing a reference on one connection.
    pub reference_object: Option<String>,
}

/// Object kinds whose statements carry no dependencies on one another and
/// may run in parallel, each under its own FQN.
const INDEPENDENT_TYPES: [&str; 5] = [
    "TABLE",
    "VIEW",
    "MATERIALIZED VIEW",
    "SEQUENCE",
    "TABLE DATA",
];

/// Group key for kinds that can depend on an earlier statement without the
/// index recording a reference (a domain over a base type). Not a valid
/// FQN, so it never collides with a relation group.
const UNTRACKED_GROUP: &str = "::untracked";

impl StatementWithType {
    /// Schema-qualified name of the statement's object.
    pub fn fqn(&self) -> String {
        crate::toc::make_fqn(&self.schema, &self.name)
    }

    /// Key for dependency grouping: the owning relation when present, the
    /// object's own FQN for independent kinds. Everything else shares one
    /// group, so insertion order stays its execution order.
    pub fn dependency_group(&self) -> String {
        if let Some(reference) = &self.reference_object {
            return reference.clone();
        }
        if INDEPENDENT_TYPES.contains(&self.object_type.as_str()) {
            self.fqn()
        } else {
            UNTRACKED_GROUP.to_string()
        }
    }
}

/// Reads the statements for `entries` out of one section metadata file.
///
/// Each statement is value-copied out; no file handle is retained past the
/// call. An entry whose range exceeds the artifact's length is fatal.
pub fn extract_statements(
    metadata_path: &Path,
    entries: &[&MetadataEntry],
) -> ExtractResult<Vec<StatementWithType>> {
    let mut file =
        File::open(metadata_path).map_err(|e| ExtractError::io_error_at_path(metadata_path, e))?;
    let file_len = file
        .metadata()
        .map_err(|e| ExtractError::io_error_at_path(metadata_path, e))?
        .len();

    let mut statements = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.end_byte > file_len {
            return Err(ExtractError::out_of_bounds(format!(
                "entry {} ({}) has range [{}, {}) but {} is only {} bytes",
                entry.fqn(),
                entry.object_type,
                entry.start_byte,
                entry.end_byte,
                metadata_path.display(),
                file_len
            )));
        }

        file.seek(SeekFrom::Start(entry.start_byte))
            .map_err(|e| ExtractError::io_error_at_path(metadata_path, e))?;
        let mut buf = vec![0u8; (entry.end_byte - entry.start_byte) as usize];
        file.read_exact(&mut buf)
            .map_err(|e| ExtractError::io_error_at_path(metadata_path, e))?;

        let statement = String::from_utf8(buf).map_err(|e| {
            ExtractError::encoding(format!(
                "entry {} at bytes [{}, {}) of {} is not valid UTF-8: {}",
                entry.fqn(),
                entry.start_byte,
                entry.end_byte,
                metadata_path.display(),
                e
            ))
        })?;

        statements.push(StatementWithType {
            statement,
            object_type: entry.object_type.clone(),
            schema: entry.schema.clone(),
            name: entry.name.clone(),
            reference_object: entry.reference_object.clone(),
        });
    }
    Ok(statements)
}

/// Looks up one section's surviving entries in a backup's index and
/// extracts their statements from that backup's metadata file.
pub fn statements_for_section(
    toc: &Toc,
    fp_info: &FilePathInfo,
    section: Section,
    include_types: &[&str],
    exclude_types: &[&str],
    filters: &Filters,
) -> ExtractResult<Vec<StatementWithType>> {
    let entries = toc.lookup(section, include_types, exclude_types, filters);
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    extract_statements(&fp_info.section_file_path(section), &entries)
}
