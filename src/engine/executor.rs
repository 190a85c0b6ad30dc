//! Statement scheduling and execution
//!
//! Within one section, statements are partitioned into dependency groups
//! (a table plus its own indexes and constraints share a group, keyed by
//! the owning relation; kinds with untracked dependencies, like types and
//! domains, share one group). Whole groups are assigned round-robin to
//! connections, so mutual order inside a group is preserved while
//! independent groups run in parallel. Assignment happens up front; the
//! worker threads then drain their queues without further coordination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::extract::StatementWithType;
use crate::observability::Logger;

use super::connection::DbConnection;
use super::errors::{EngineError, EngineResult};

/// What to do when a statement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// First failure stops further dispatch and is surfaced immediately.
    FailFast,
    /// Every statement runs; failures are counted and reported at the end.
    ContinueAndCount,
}

/// One statement that failed against the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStatement {
    pub object_type: String,
    pub fqn: String,
    pub message: String,
}

/// Outcome of one section's execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Statements that ran to completion, successfully or not.
    pub attempted: usize,
    /// Failed objects, in completion order.
    pub failures: Vec<FailedStatement>,
}

impl ExecutionSummary {
    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    fn merge(&mut self, other: ExecutionSummary) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

/// Stops new dispatch; in-flight statements finish. Connections are not
/// interruptible mid-statement.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The execution engine for one restore run.
pub struct ExecutionEngine {
    policy: ErrorPolicy,
    cancel: CancellationToken,
    progress: Arc<AtomicUsize>,
}

impl ExecutionEngine {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Token shared with whoever may want to stop the run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Statements completed so far across all sections. Observational
    /// only; never consulted by scheduling.
    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    /// Executes one section's statements across the pool.
    ///
    /// Returns the summary under ContinueAndCount; under FailFast the
    /// first failure is surfaced as an error after in-flight statements
    /// have finished.
    pub fn execute(
        &self,
        statements: &[StatementWithType],
        pool: &mut [Box<dyn DbConnection>],
    ) -> EngineResult<ExecutionSummary> {
        if pool.is_empty() {
            return Err(EngineError::EmptyPool);
        }
        if statements.is_empty() {
            return Ok(ExecutionSummary::default());
        }

        let queues = assign_to_connections(statements, pool.len());

        let abort = AtomicBool::new(false);
        let attempted = AtomicUsize::new(0);
        let failures: Mutex<Vec<FailedStatement>> = Mutex::new(Vec::new());
        let policy = self.policy;

        thread::scope(|scope| {
            for (conn, queue) in pool.iter_mut().zip(queues) {
                if queue.is_empty() {
                    continue;
                }
                let abort = &abort;
                let attempted = &attempted;
                let failures = &failures;
                let cancel = &self.cancel;
                let progress = &self.progress;
                scope.spawn(move || {
                    for statement in queue {
                        if abort.load(Ordering::SeqCst) || cancel.is_cancelled() {
                            break;
                        }
                        if let Err(e) = conn.exec(&statement.statement) {
                            let fqn = statement.fqn();
                            Logger::error(
                                "STATEMENT_FAILED",
                                &[
                                    ("object_type", statement.object_type.as_str()),
                                    ("object", fqn.as_str()),
                                    ("error", e.message.as_str()),
                                ],
                            );
                            failures.lock().unwrap().push(FailedStatement {
                                object_type: statement.object_type.clone(),
                                fqn: statement.fqn(),
                                message: e.message,
                            });
                            if policy == ErrorPolicy::FailFast {
                                abort.store(true, Ordering::SeqCst);
                                attempted.fetch_add(1, Ordering::SeqCst);
                                progress.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                        }
                        attempted.fetch_add(1, Ordering::SeqCst);
                        progress.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        let summary = ExecutionSummary {
            attempted: attempted.load(Ordering::SeqCst),
            failures: failures.into_inner().unwrap(),
        };

        if policy == ErrorPolicy::FailFast {
            if let Some(first) = summary.failures.first() {
                return Err(EngineError::StatementFailed {
                    object_type: first.object_type.clone(),
                    object: first.fqn.clone(),
                    source: super::connection::ExecError::new(first.message.clone()),
                });
            }
        } else if summary.error_count() > 0 {
            let count = summary.error_count().to_string();
            Logger::error("SECTION_ERRORS", &[("error_count", count.as_str())]);
        }
        Ok(summary)
    }

    /// Runs several batches strictly in order: each batch fully completes
    /// before the next starts. Used to order sections.
    pub fn execute_in_order(
        &self,
        batches: &[&[StatementWithType]],
        pool: &mut [Box<dyn DbConnection>],
    ) -> EngineResult<ExecutionSummary> {
        let mut total = ExecutionSummary::default();
        for batch in batches {
            total.merge(self.execute(batch, pool)?);
        }
        Ok(total)
    }

    /// Creates schemas serially on one connection. Always
    /// continue-and-count, with "already exists" downgraded to a warning
    /// so a race with discovery does not fail the run.
    pub fn restore_schemas(
        &self,
        statements: &[StatementWithType],
        conn: &mut dyn DbConnection,
    ) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();
        for statement in statements {
            if self.cancel.is_cancelled() {
                break;
            }
            match conn.exec(&statement.statement) {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {
                    Logger::warn(
                        "SCHEMA_ALREADY_EXISTS",
                        &[("schema", statement.name.as_str())],
                    );
                }
                Err(e) => {
                    Logger::error(
                        "SCHEMA_CREATE_FAILED",
                        &[
                            ("schema", statement.name.as_str()),
                            ("error", e.message.as_str()),
                        ],
                    );
                    summary.failures.push(FailedStatement {
                        object_type: statement.object_type.clone(),
                        fqn: statement.fqn(),
                        message: e.message,
                    });
                }
            }
            summary.attempted += 1;
            self.progress.fetch_add(1, Ordering::SeqCst);
        }
        if summary.error_count() > 0 {
            let count = summary.error_count().to_string();
            Logger::error("SCHEMA_ERRORS", &[("error_count", count.as_str())]);
        }
        summary
    }
}

/// Partitions statements into per-connection queues. Dependency groups are
/// assigned whole, round-robin in first-appearance order; statements inside
/// a queue keep their stream order.
fn assign_to_connections(
    statements: &[StatementWithType],
    connections: usize,
) -> Vec<Vec<StatementWithType>> {
    let mut queues: Vec<Vec<StatementWithType>> = vec![Vec::new(); connections];
    let mut group_to_conn: HashMap<String, usize> = HashMap::new();
    let mut next_conn = 0;

    for statement in statements {
        let group = statement.dependency_group();
        let conn = *group_to_conn.entry(group).or_insert_with(|| {
            let assigned = next_conn;
            next_conn = (next_conn + 1) % connections;
            assigned
        });
        queues[conn].push(statement.clone());
    }
    queues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records executions into a shared log; statements whose text appears
    /// in `failing` return an error.
    struct MockConnection {
        id: usize,
        log: Arc<Mutex<Vec<(usize, String)>>>,
        failing: HashSet<String>,
        already_exists: HashSet<String>,
    }

    impl MockConnection {
        fn pool(
            n: usize,
            log: &Arc<Mutex<Vec<(usize, String)>>>,
            failing: &[&str],
            already_exists: &[&str],
        ) -> Vec<Box<dyn DbConnection>> {
            (0..n)
                .map(|id| {
                    Box::new(MockConnection {
                        id,
                        log: Arc::clone(log),
                        failing: failing.iter().map(|s| s.to_string()).collect(),
                        already_exists: already_exists.iter().map(|s| s.to_string()).collect(),
                    }) as Box<dyn DbConnection>
                })
                .collect()
        }
    }

    impl DbConnection for MockConnection {
        fn exec(&mut self, sql: &str) -> super::super::connection::ExecResult {
            self.log.lock().unwrap().push((self.id, sql.to_string()));
            if self.already_exists.contains(sql) {
                return Err(super::super::connection::ExecError::new(format!(
                    "\"{}\" already exists",
                    sql
                )));
            }
            if self.failing.contains(sql) {
                return Err(super::super::connection::ExecError::new(format!(
                    "error executing {}",
                    sql
                )));
            }
            Ok(())
        }
    }

    fn statement(sql: &str, schema: &str, name: &str, reference: Option<&str>) -> StatementWithType {
        StatementWithType {
            statement: sql.to_string(),
            object_type: "TABLE".to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
            reference_object: reference.map(str::to_string),
        }
    }

    #[test]
    fn test_continue_and_count_runs_everything() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &["stmt2"], &[]);
        let statements = vec![
            statement("stmt1", "s1", "a", None),
            statement("stmt2", "s1", "b", None),
            statement("stmt3", "s1", "c", None),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::ContinueAndCount);
        let summary = engine.execute(&statements, &mut pool).unwrap();

        // Statements 1 and 3 both execute despite 2 failing.
        let executed: Vec<String> =
            log.lock().unwrap().iter().map(|(_, s)| s.clone()).collect();
        assert_eq!(executed, vec!["stmt1", "stmt2", "stmt3"]);
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.failures[0].fqn, "s1.b");
        assert_eq!(summary.attempted, 3);
        assert_eq!(engine.progress(), 3);
    }

    #[test]
    fn test_fail_fast_stops_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &["stmt1"], &[]);
        let statements = vec![
            statement("stmt1", "s1", "a", None),
            statement("stmt2", "s1", "b", None),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        let err = engine.execute(&statements, &mut pool).unwrap_err();

        assert!(matches!(err, EngineError::StatementFailed { .. }));
        let executed: Vec<String> =
            log.lock().unwrap().iter().map(|(_, s)| s.clone()).collect();
        assert_eq!(executed, vec!["stmt1"]);
    }

    #[test]
    fn test_dependency_group_stays_on_one_connection_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(4, &log, &[], &[]);

        // Two tables, each followed by its own index. Interleave unrelated
        // groups to exercise round-robin assignment.
        let statements = vec![
            statement("create t1", "s1", "t1", None),
            statement("create t2", "s1", "t2", None),
            statement("index t1", "s1", "t1_idx", Some("s1.t1")),
            statement("index t2", "s1", "t2_idx", Some("s1.t2")),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        engine.execute(&statements, &mut pool).unwrap();

        let executed = log.lock().unwrap().clone();
        let conn_of = |sql: &str| {
            executed
                .iter()
                .find(|(_, s)| s == sql)
                .map(|(id, _)| *id)
                .unwrap()
        };
        let pos_of = |sql: &str| executed.iter().position(|(_, s)| s == sql).unwrap();

        // A table and its index share a connection, table first.
        assert_eq!(conn_of("create t1"), conn_of("index t1"));
        assert_eq!(conn_of("create t2"), conn_of("index t2"));
        assert!(pos_of("create t1") < pos_of("index t1"));
        assert!(pos_of("create t2") < pos_of("index t2"));
        // Independent groups land on different connections.
        assert_ne!(conn_of("create t1"), conn_of("create t2"));
    }

    #[test]
    fn test_type_and_dependent_domain_share_a_connection_in_wide_pool() {
        // A domain's dependency on its base type is not recorded in the
        // index, so with multiple connections both must still land on one
        // connection, type first. Tables keep their own groups.
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(4, &log, &[], &[]);

        let statements = vec![
            StatementWithType {
                statement: "create type x".to_string(),
                object_type: "TYPE".to_string(),
                schema: "s1".to_string(),
                name: "x".to_string(),
                reference_object: None,
            },
            StatementWithType {
                statement: "create domain y".to_string(),
                object_type: "DOMAIN".to_string(),
                schema: "s1".to_string(),
                name: "y".to_string(),
                reference_object: None,
            },
            statement("create t1", "s1", "t1", None),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        engine.execute(&statements, &mut pool).unwrap();

        let executed = log.lock().unwrap().clone();
        let conn_of = |sql: &str| {
            executed
                .iter()
                .find(|(_, s)| s == sql)
                .map(|(id, _)| *id)
                .unwrap()
        };
        let pos_of = |sql: &str| executed.iter().position(|(_, s)| s == sql).unwrap();

        assert_eq!(conn_of("create type x"), conn_of("create domain y"));
        assert!(pos_of("create type x") < pos_of("create domain y"));
        assert_ne!(conn_of("create type x"), conn_of("create t1"));
    }

    #[test]
    fn test_insertion_order_preserved_on_one_connection() {
        // A base type and a domain depending on it must execute in index
        // insertion order when assigned to the same connection.
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &[], &[]);

        let statements = vec![
            StatementWithType {
                statement: "create type x".to_string(),
                object_type: "TYPE".to_string(),
                schema: "s1".to_string(),
                name: "x".to_string(),
                reference_object: None,
            },
            StatementWithType {
                statement: "create domain y".to_string(),
                object_type: "DOMAIN".to_string(),
                schema: "s1".to_string(),
                name: "y".to_string(),
                reference_object: None,
            },
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        engine.execute(&statements, &mut pool).unwrap();

        let executed: Vec<String> =
            log.lock().unwrap().iter().map(|(_, s)| s.clone()).collect();
        assert_eq!(executed, vec!["create type x", "create domain y"]);
    }

    #[test]
    fn test_batches_run_strictly_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(2, &log, &[], &[]);

        let predata = vec![
            statement("create t1", "s1", "t1", None),
            statement("create t2", "s1", "t2", None),
        ];
        let postdata = vec![
            statement("index t1", "s1", "t1_idx", Some("s1.t1")),
            statement("index t2", "s1", "t2_idx", Some("s1.t2")),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        engine
            .execute_in_order(&[&predata, &postdata], &mut pool)
            .unwrap();

        let executed = log.lock().unwrap().clone();
        let last_create = executed
            .iter()
            .rposition(|(_, s)| s.starts_with("create"))
            .unwrap();
        let first_index = executed
            .iter()
            .position(|(_, s)| s.starts_with("index"))
            .unwrap();
        assert!(last_create < first_index);
    }

    #[test]
    fn test_cancellation_stops_new_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &[], &[]);
        let statements = vec![statement("stmt1", "s1", "a", None)];

        let engine = ExecutionEngine::new(ErrorPolicy::ContinueAndCount);
        engine.cancellation_token().cancel();
        let summary = engine.execute(&statements, &mut pool).unwrap();

        assert_eq!(summary.attempted, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_schema_restore_downgrades_already_exists() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &["create schema s3"], &["create schema s1"]);
        let statements = vec![
            StatementWithType {
                statement: "create schema s1".to_string(),
                object_type: "SCHEMA".to_string(),
                schema: "s1".to_string(),
                name: "s1".to_string(),
                reference_object: None,
            },
            StatementWithType {
                statement: "create schema s2".to_string(),
                object_type: "SCHEMA".to_string(),
                schema: "s2".to_string(),
                name: "s2".to_string(),
                reference_object: None,
            },
            StatementWithType {
                statement: "create schema s3".to_string(),
                object_type: "SCHEMA".to_string(),
                schema: "s3".to_string(),
                name: "s3".to_string(),
                reference_object: None,
            },
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::ContinueAndCount);
        let summary = engine.restore_schemas(&statements, pool[0].as_mut());

        // Already-exists is a warning, a real failure is counted, and one
        // bad schema never blocks the rest.
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.error_count(), 1);
        assert_eq!(summary.failures[0].fqn, "s3.s3");
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let engine = ExecutionEngine::new(ErrorPolicy::FailFast);
        let mut pool: Vec<Box<dyn DbConnection>> = Vec::new();
        let statements = vec![statement("stmt1", "s1", "a", None)];
        assert_eq!(
            engine.execute(&statements, &mut pool).unwrap_err(),
            EngineError::EmptyPool
        );
    }

    #[test]
    fn test_progress_counts_failures_too() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pool = MockConnection::pool(1, &log, &["stmt2"], &[]);
        let statements = vec![
            statement("stmt1", "s1", "a", None),
            statement("stmt2", "s1", "b", None),
        ];

        let engine = ExecutionEngine::new(ErrorPolicy::ContinueAndCount);
        engine.execute(&statements, &mut pool).unwrap();
        assert_eq!(engine.progress(), 2);
    }
}
