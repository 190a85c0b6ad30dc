//! shardback - selective, incremental backup and restore for distributed
//! SQL clusters
//!
//! A backup is two tiers of artifacts: ordered DDL text per section plus
//! a byte-addressed index over it. A restore reconstructs a user-selected
//! subset of schema and data across many cooperating connections, in
//! dependency order, following an incremental chain of backups.

pub mod capabilities;
pub mod cli;
pub mod context;
pub mod engine;
pub mod extract;
pub mod filters;
pub mod object;
pub mod observability;
pub mod plan;
pub mod reconcile;
pub mod restore;
pub mod toc;
