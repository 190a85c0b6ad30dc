//! CLI argument definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// shardback - selective backup and restore for distributed SQL clusters
#[derive(Parser, Debug)]
#[command(name = "shardback")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every command that reads a backup set.
#[derive(Args, Debug, Clone)]
pub struct BackupLocation {
    /// Directory holding the backup sets
    #[arg(long)]
    pub backup_dir: PathBuf,

    /// Timestamp of the backup to operate on (YYYYMMDDHHMMSS)
    #[arg(long)]
    pub timestamp: String,

    /// Artifact filename prefix
    #[arg(long, default_value = "backup")]
    pub seg_prefix: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and verify the incremental chain ending at a timestamp
    Plan {
        #[command(flatten)]
        location: BackupLocation,
    },

    /// Print the DDL statements a filtered restore of one section would run
    Statements {
        #[command(flatten)]
        location: BackupLocation,

        /// Section to extract: predata, data, postdata or global
        #[arg(long)]
        section: String,

        /// Restrict to these schemas (repeatable)
        #[arg(long = "include-schema")]
        include_schemas: Vec<String>,

        /// Skip these schemas (repeatable)
        #[arg(long = "exclude-schema")]
        exclude_schemas: Vec<String>,

        /// Restrict to these schema-qualified relations (repeatable)
        #[arg(long = "include-relation")]
        include_relations: Vec<String>,

        /// Skip these schema-qualified relations (repeatable)
        #[arg(long = "exclude-relation")]
        exclude_relations: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
