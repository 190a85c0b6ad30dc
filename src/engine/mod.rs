//! Parallel statement execution engine
//!
//! Executes an ordered statement stream across a fixed pool of database
//! connections. Sections run strictly sequentially; within a section,
//! parallelism comes from distributing independent dependency groups
//! across connections. Each connection executes its assigned statements
//! synchronously, in assignment order, which together with grouping is
//! the engine's only intra-section ordering guarantee.

mod connection;
mod errors;
mod executor;

pub use connection::{ConnectionFactory, DbConnection, ExecError, ExecResult};
pub use errors::{EngineError, EngineResult};
pub use executor::{
    CancellationToken, ErrorPolicy, ExecutionEngine, ExecutionSummary, FailedStatement,
};
