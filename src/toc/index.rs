//! The index structure itself
//!
//! Persisted as `<prefix>_toc.json` next to the section metadata files.
//! The index carries one entry list per section plus the table-to-data-file
//! mappings. Accessors never reorder entries: insertion order is the only
//! intra-section ordering contract the restore relies on.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::filters::{relation_is_excluded, schema_is_excluded, Filters};

use super::entry::{DataEntry, MetadataEntry, Section};
use super::errors::{TocError, TocResult};

/// Object types matched against relation filters. Everything else is
/// filtered by schema only.
const RELATION_TYPES: [&str; 4] = ["TABLE", "VIEW", "MATERIALIZED VIEW", "SEQUENCE"];

/// Byte-addressed table of contents for one backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    /// Metadata entries per section, in insertion (execution) order.
    #[serde(default)]
    pub sections: BTreeMap<Section, Vec<MetadataEntry>>,

    /// Table-to-data-file mappings, in backup order.
    #[serde(default)]
    pub data_entries: Vec<DataEntry>,
}

impl Toc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write cursor for a section: one past the last byte any
    /// entry in that section covers. Empty sections start at zero.
    pub fn cursor(&self, section: Section) -> u64 {
        self.sections
            .get(&section)
            .and_then(|entries| entries.last())
            .map(|entry| entry.end_byte)
            .unwrap_or(0)
    }

    /// Appends a metadata entry.
    ///
    /// The entry's start byte must equal the section cursor; this is what
    /// guarantees ranges in one section file never overlap. Violations are
    /// structural and fatal.
    pub fn add_metadata_entry(&mut self, section: Section, entry: MetadataEntry) -> TocResult<()> {
        if entry.start_byte > entry.end_byte {
            return Err(TocError::order(format!(
                "entry {} ({}) has start byte {} after end byte {}",
                entry.fqn(),
                entry.object_type,
                entry.start_byte,
                entry.end_byte
            )));
        }
        let cursor = self.cursor(section);
        if entry.start_byte != cursor {
            return Err(TocError::order(format!(
                "entry {} ({}) starts at byte {} but section {} cursor is at {}",
                entry.fqn(),
                entry.object_type,
                entry.start_byte,
                section,
                cursor
            )));
        }
        self.sections.entry(section).or_default().push(entry);
        Ok(())
    }

    /// Records one table's data mapping.
    pub fn add_data_entry(&mut self, entry: DataEntry) {
        self.data_entries.push(entry);
    }

    /// Entries of a section, in insertion order. A section with no entries
    /// is valid and yields an empty slice.
    pub fn section_entries(&self, section: Section) -> &[MetadataEntry] {
        self.sections
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the entries of `section` passing the object-type and
    /// schema/relation filters, in insertion order.
    ///
    /// Relation-kind entries (and dependent entries carrying a reference
    /// object) are matched against the relation filters by FQN; every entry
    /// is matched against the schema filters.
    pub fn lookup(
        &self,
        section: Section,
        include_types: &[&str],
        exclude_types: &[&str],
        filters: &Filters,
    ) -> Vec<&MetadataEntry> {
        let mut matched = Vec::new();
        for entry in self.section_entries(section) {
            let type_included = include_types.is_empty()
                || include_types.iter().any(|t| *t == entry.object_type);
            let type_excluded = exclude_types.iter().any(|t| *t == entry.object_type);
            if !type_included || type_excluded {
                continue;
            }
            if schema_is_excluded(&filters.include_schemas, &filters.exclude_schemas, &entry.schema)
            {
                continue;
            }
            let relation_scoped = entry.reference_object.is_some()
                || RELATION_TYPES.contains(&entry.object_type.as_str());
            if relation_scoped
                && relation_is_excluded(
                    &filters.include_relations,
                    &filters.exclude_relations,
                    &entry.filter_fqn(),
                )
            {
                continue;
            }
            matched.push(entry);
        }
        matched
    }

    /// Data entries whose tables pass the filters, in backup order.
    pub fn data_entries_matching(&self, filters: &Filters) -> Vec<&DataEntry> {
        self.data_entries
            .iter()
            .filter(|entry| {
                !schema_is_excluded(
                    &filters.include_schemas,
                    &filters.exclude_schemas,
                    &entry.schema,
                ) && !relation_is_excluded(
                    &filters.include_relations,
                    &filters.exclude_relations,
                    &entry.fqn(),
                )
            })
            .collect()
    }

    /// FQNs of every table with a data entry.
    pub fn data_entry_fqns(&self) -> Vec<String> {
        self.data_entries.iter().map(DataEntry::fqn).collect()
    }

    /// Map from leaf-partition FQN to its partition root's FQN, derived
    /// from the data entries.
    pub fn child_to_root(&self) -> HashMap<String, String> {
        self.data_entries
            .iter()
            .filter_map(|entry| {
                entry
                    .partition_root
                    .as_ref()
                    .map(|root| (entry.fqn(), root.clone()))
            })
            .collect()
    }

    /// Serializes the index to JSON.
    pub fn to_json(&self) -> TocResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TocError::format(format!("failed to serialize index: {}", e)))
    }

    /// Deserializes an index from JSON and re-checks the cursor contract.
    pub fn from_json(json: &str) -> TocResult<Self> {
        let toc: Toc = serde_json::from_str(json)
            .map_err(|e| TocError::format(format!("failed to parse index: {}", e)))?;
        toc.validate()?;
        Ok(toc)
    }

    /// Writes the index to a file with fsync.
    pub fn write_to_file(&self, path: &Path) -> TocResult<()> {
        let json = self.to_json()?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TocError::io_error(
                        format!("failed to create index directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let mut file = File::create(path).map_err(|e| TocError::io_error_at_path(path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| TocError::io_error_at_path(path, e))?;
        file.sync_all()
            .map_err(|e| TocError::io_error(format!("failed to fsync {}", path.display()), e))?;
        Ok(())
    }

    /// Reads an index from a file.
    pub fn read_from_file(path: &Path) -> TocResult<Self> {
        let mut file = File::open(path).map_err(|e| TocError::io_error_at_path(path, e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| TocError::io_error_at_path(path, e))?;
        Self::from_json(&contents)
    }

    /// Checks that each section's entries partition a prefix of the section
    /// file: contiguous, non-overlapping, starting at zero.
    fn validate(&self) -> TocResult<()> {
        for (section, entries) in &self.sections {
            let mut cursor = 0;
            for entry in entries {
                if entry.start_byte > entry.end_byte || entry.start_byte != cursor {
                    return Err(TocError::format(format!(
                        "section {} entry {} ({}) has range [{}, {}) but cursor is at {}",
                        section,
                        entry.fqn(),
                        entry.object_type,
                        entry.start_byte,
                        entry.end_byte,
                        cursor
                    )));
                }
                cursor = entry.end_byte;
            }
        }
        Ok(())
    }
}
