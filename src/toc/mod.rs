//! Table-of-contents index for backup artifacts
//!
//! Each backup writes one UTF-8 text file of concatenated DDL statements per
//! section, plus this index mapping every object to its byte range in that
//! text. A selective restore reads only the chosen ranges and never scans the
//! full metadata file.
//!
//! # Invariants
//!
//! - Entries are append-only; an entry's start byte always equals the section
//!   write cursor, so ranges in one section never overlap.
//! - Insertion order is a valid execution order (base types before domains,
//!   tables before their indexes).
//! - The index is read-only during restore.

mod entry;
mod errors;
mod index;

pub use entry::{make_fqn, schema_of, DataEntry, MetadataEntry, Section};
pub use errors::{TocError, TocErrorCode, TocResult};
pub use index::Toc;
