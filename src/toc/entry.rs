//! Index entry types
//!
//! A `MetadataEntry` locates one object's DDL inside a section's metadata
//! file. A `DataEntry` describes one table's bulk data and its partition
//! linkage. Both are created once during backup and never mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordering phase of a restore. Sections always execute in
/// global, predata, data, postdata order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Global,
    Predata,
    Data,
    Postdata,
}

impl Section {
    /// Returns the section name as stored in the index file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Global => "global",
            Section::Predata => "predata",
            Section::Data => "data",
            Section::Postdata => "postdata",
        }
    }

    /// All sections in execution order.
    pub fn all() -> [Section; 4] {
        [
            Section::Global,
            Section::Predata,
            Section::Data,
            Section::Postdata,
        ]
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One object's location inside a section's metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Schema the object belongs to.
    pub schema: String,

    /// Object name, unqualified.
    pub name: String,

    /// Object kind, e.g. "TABLE", "INDEX", "SCHEMA".
    pub object_type: String,

    /// For dependent objects (an index, a constraint), the FQN of the
    /// relation they belong to. Dependent objects are filtered and
    /// scheduled by this name, not their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_object: Option<String>,

    /// First byte of the object's DDL in the section file.
    pub start_byte: u64,

    /// One past the last byte of the object's DDL.
    pub end_byte: u64,
}

impl MetadataEntry {
    /// Schema-qualified name of the object itself.
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    /// The FQN this entry is filtered by: the owning relation for
    /// dependent objects, otherwise the object's own FQN.
    pub fn filter_fqn(&self) -> String {
        match &self.reference_object {
            Some(reference) => reference.clone(),
            None => self.fqn(),
        }
    }
}

/// One table's bulk data: identity, partition linkage, and (for single
/// data file backups) the byte range inside the shared data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Catalog oid of the table; names the data file for per-table backups.
    pub oid: u32,

    /// Schema the table belongs to.
    pub schema: String,

    /// Table name, unqualified.
    pub name: String,

    /// FQN of the partition root, for leaf partitions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_root: Option<String>,

    /// Byte range in the shared data file, absent for per-table files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_byte: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_byte: Option<u64>,
}

impl DataEntry {
    /// Schema-qualified table name.
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }
}

/// Builds a schema-qualified name.
pub fn make_fqn(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

/// Splits an FQN into its schema part. FQNs are always schema-qualified;
/// a bare name maps to itself.
pub fn schema_of(fqn: &str) -> &str {
    match fqn.split_once('.') {
        Some((schema, _)) => schema,
        None => fqn,
    }
}
