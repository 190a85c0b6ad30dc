//! DDL object kinds and the byte-counting metadata writer
//!
//! One tagged-variant type covers every object kind the backup emits. Each
//! variant knows how to render its CREATE statement, which section it
//! belongs to, and what its index entry looks like. The catalog queries
//! that populate these variants live outside this crate; the writer below
//! is the seam between DDL synthesis and the byte-addressed index.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::toc::{make_fqn, MetadataEntry, Section, Toc, TocError, TocResult};

/// One backed-up database object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlObject {
    Schema {
        name: String,
    },
    Type {
        schema: String,
        name: String,
        definition: String,
    },
    Domain {
        schema: String,
        name: String,
        base_type: String,
    },
    Function {
        schema: String,
        name: String,
        definition: String,
    },
    Table {
        schema: String,
        name: String,
        columns: Vec<String>,
    },
    View {
        schema: String,
        name: String,
        query: String,
    },
    Sequence {
        schema: String,
        name: String,
    },
    Index {
        schema: String,
        name: String,
        table_fqn: String,
        definition: String,
    },
    Constraint {
        schema: String,
        name: String,
        table_fqn: String,
        definition: String,
    },
    Trigger {
        schema: String,
        name: String,
        table_fqn: String,
        definition: String,
    },
    /// Session-level settings restored before anything else.
    SessionGuc {
        name: String,
        value: String,
    },
}

impl DdlObject {
    /// Section this object's DDL belongs to.
    pub fn section(&self) -> Section {
        match self {
            DdlObject::SessionGuc { .. } => Section::Global,
            DdlObject::Index { .. }
            | DdlObject::Constraint { .. }
            | DdlObject::Trigger { .. } => Section::Postdata,
            _ => Section::Predata,
        }
    }

    /// Object type tag as stored in the index.
    pub fn object_type(&self) -> &'static str {
        match self {
            DdlObject::Schema { .. } => "SCHEMA",
            DdlObject::Type { .. } => "TYPE",
            DdlObject::Domain { .. } => "DOMAIN",
            DdlObject::Function { .. } => "FUNCTION",
            DdlObject::Table { .. } => "TABLE",
            DdlObject::View { .. } => "VIEW",
            DdlObject::Sequence { .. } => "SEQUENCE",
            DdlObject::Index { .. } => "INDEX",
            DdlObject::Constraint { .. } => "CONSTRAINT",
            DdlObject::Trigger { .. } => "TRIGGER",
            DdlObject::SessionGuc { .. } => "SESSION GUCS",
        }
    }

    /// Schema-qualified name; schemas and session settings qualify as
    /// themselves.
    pub fn qualified_name(&self) -> String {
        match self {
            DdlObject::Schema { name } | DdlObject::SessionGuc { name, .. } => name.clone(),
            DdlObject::Type { schema, name, .. }
            | DdlObject::Domain { schema, name, .. }
            | DdlObject::Function { schema, name, .. }
            | DdlObject::Table { schema, name, .. }
            | DdlObject::View { schema, name, .. }
            | DdlObject::Sequence { schema, name }
            | DdlObject::Index { schema, name, .. }
            | DdlObject::Constraint { schema, name, .. }
            | DdlObject::Trigger { schema, name, .. } => make_fqn(schema, name),
        }
    }

    /// Renders the CREATE (or SET) statement for this object.
    pub fn render(&self) -> String {
        match self {
            DdlObject::Schema { name } => format!("\n\nCREATE SCHEMA {};\n", name),
            DdlObject::Type {
                schema,
                name,
                definition,
            } => format!("\n\nCREATE TYPE {}.{} AS {};\n", schema, name, definition),
            DdlObject::Domain {
                schema,
                name,
                base_type,
            } => format!("\n\nCREATE DOMAIN {}.{} AS {};\n", schema, name, base_type),
            DdlObject::Function {
                schema,
                name,
                definition,
            } => format!("\n\nCREATE FUNCTION {}.{} {};\n", schema, name, definition),
            DdlObject::Table {
                schema,
                name,
                columns,
            } => format!(
                "\n\nCREATE TABLE {}.{} (\n\t{}\n);\n",
                schema,
                name,
                columns.join(",\n\t")
            ),
            DdlObject::View {
                schema,
                name,
                query,
            } => format!("\n\nCREATE VIEW {}.{} AS {};\n", schema, name, query),
            DdlObject::Sequence { schema, name } => {
                format!("\n\nCREATE SEQUENCE {}.{};\n", schema, name)
            }
            DdlObject::Index { definition, .. }
            | DdlObject::Trigger { definition, .. } => format!("\n\n{};\n", definition),
            DdlObject::Constraint {
                name,
                table_fqn,
                definition,
                ..
            } => format!(
                "\n\nALTER TABLE {} ADD CONSTRAINT {} {};\n",
                table_fqn, name, definition
            ),
            DdlObject::SessionGuc { name, value } => format!("SET {} = {};\n", name, value),
        }
    }

    /// Index entry fields for this object; byte range is supplied by the
    /// writer at emission time.
    pub fn metadata_entry(&self, start_byte: u64, end_byte: u64) -> (Section, MetadataEntry) {
        let (schema, name, reference_object) = match self {
            DdlObject::Schema { name } => (name.clone(), name.clone(), None),
            DdlObject::SessionGuc { name, .. } => (String::new(), name.clone(), None),
            DdlObject::Index {
                schema,
                name,
                table_fqn,
                ..
            }
            | DdlObject::Constraint {
                schema,
                name,
                table_fqn,
                ..
            }
            | DdlObject::Trigger {
                schema,
                name,
                table_fqn,
                ..
            } => (schema.clone(), name.clone(), Some(table_fqn.clone())),
            DdlObject::Type { schema, name, .. }
            | DdlObject::Domain { schema, name, .. }
            | DdlObject::Function { schema, name, .. }
            | DdlObject::Table { schema, name, .. }
            | DdlObject::View { schema, name, .. }
            | DdlObject::Sequence { schema, name } => (schema.clone(), name.clone(), None),
        };
        (
            self.section(),
            MetadataEntry {
                schema,
                name,
                object_type: self.object_type().to_string(),
                reference_object,
                start_byte,
                end_byte,
            },
        )
    }
}

/// A section metadata file that tracks its own byte count, so index entries
/// receive exact offsets without re-measuring the file.
pub struct MetadataFile<W: Write> {
    writer: W,
    byte_count: u64,
}

impl MetadataFile<BufWriter<File>> {
    /// Creates a metadata file on disk.
    pub fn create(path: &Path) -> TocResult<Self> {
        let file = File::create(path).map_err(|e| TocError::io_error_at_path(path, e))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    /// Flushes and fsyncs the underlying file.
    pub fn sync(mut self) -> TocResult<()> {
        self.writer
            .flush()
            .map_err(|e| TocError::io_error("failed to flush metadata file", e))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| TocError::io_error("failed to fsync metadata file", e))
    }
}

impl<W: Write> MetadataFile<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            byte_count: 0,
        }
    }

    /// Bytes written so far; the next object's start offset.
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    /// Renders one object into the file and records its byte range in the
    /// index. The start offset is read before writing and the end offset
    /// after, which is exactly the cursor contract the index enforces.
    pub fn write_object(&mut self, toc: &mut Toc, object: &DdlObject) -> TocResult<()> {
        let start = self.byte_count;
        let text = object.render();
        self.writer
            .write_all(text.as_bytes())
            .map_err(|e| TocError::io_error(format!("failed to write {}", object.qualified_name()), e))?;
        self.byte_count += text.len() as u64;

        let (section, entry) = object.metadata_entry(start, self.byte_count);
        toc.add_metadata_entry(section, entry)
    }
}
