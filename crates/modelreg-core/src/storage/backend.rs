//! Deadline-bounded execution of search queries.

use super::pool::ConnectionPool;
use crate::search::materialize::{materialize, ColumnShape};
use crate::search::{BuiltQuery, Record};
use crate::{RegistryError, Result};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, InterruptHandle};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Storage the search engine reads from.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` and materialize every row, giving up after `deadline`.
    async fn fetch(&self, query: BuiltQuery, deadline: Duration) -> Result<Vec<Record>>;
}

/// Prepare, run and materialize a query on one connection.
pub fn execute(conn: &Connection, query: &BuiltQuery) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(&query.sql)?;
    let columns = ColumnShape::of(&stmt);
    let rows = stmt.query(params_from_iter(query.args.iter()))?;
    materialize(rows, &columns)
}

/// Interrupt handle shared between the waiting task and the worker.
///
/// The worker clears the slot before its connection can go back to the pool,
/// so a late interrupt never lands on another request's statement.
#[derive(Clone)]
struct InterruptSlot(Arc<Mutex<Option<InterruptHandle>>>);

impl InterruptSlot {
    fn new(handle: InterruptHandle) -> Self {
        Self(Arc::new(Mutex::new(Some(handle))))
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.0.lock() {
            slot.take();
        }
    }

    /// Interrupt the statement if it is still running. Returns whether it was.
    fn interrupt(&self) -> bool {
        match self.0.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(handle) => {
                    handle.interrupt();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Interrupts the in-flight statement when dropped: on timeout, and when the
/// caller's future is dropped (client disconnect).
struct InterruptOnDrop(InterruptSlot);

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.0.interrupt() {
            debug!("Interrupted in-flight query");
        }
    }
}

/// [`SearchBackend`] over a SQLite [`ConnectionPool`].
#[derive(Clone)]
pub struct SqliteBackend {
    pool: ConnectionPool,
}

impl SqliteBackend {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

#[async_trait]
impl SearchBackend for SqliteBackend {
    async fn fetch(&self, query: BuiltQuery, deadline: Duration) -> Result<Vec<Record>> {
        let conn = self.pool.acquire().await?;
        let slot = InterruptSlot::new(conn.get_interrupt_handle());
        let _guard = InterruptOnDrop(slot.clone());

        let job = query.clone();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || {
            let result = execute(&conn, &job);
            slot.finish();
            result
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(Ok(records))) => {
                debug!(
                    rows = records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Search query finished"
                );
                Ok(records)
            }
            Ok(Ok(Err(e))) => {
                error!(sql = %query.sql, args = ?query.args, error = %e, "Search query failed");
                Err(e)
            }
            Ok(Err(join_error)) => {
                error!(sql = %query.sql, args = ?query.args, error = %join_error, "Search task failed");
                Err(RegistryError::Storage {
                    message: format!("search task failed: {}", join_error),
                    source: None,
                })
            }
            Err(_) => {
                warn!(sql = %query.sql, args = ?query.args, ?deadline, "Search query timed out");
                Err(RegistryError::StorageTimeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SqlArg;
    use crate::storage::PoolOptions;
    use tempfile::TempDir;

    fn create_backend(max_open: usize) -> (SqliteBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(
            temp_dir.path().join("backend.db"),
            PoolOptions {
                max_open,
                ..PoolOptions::default()
            },
        )
        .unwrap();
        (SqliteBackend::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_fetch_binds_arguments() {
        let (backend, _temp) = create_backend(2);
        let query = BuiltQuery::new(
            "SELECT ?1 AS word, ?2 AS n",
            vec![SqlArg::Text("hello".into()), SqlArg::Integer(3)],
        );
        let records = backend.fetch(query, Duration::from_secs(2)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            serde_json::to_value(&records[0]).unwrap(),
            serde_json::json!({"word": "hello", "n": 3})
        );
    }

    #[tokio::test]
    async fn test_fetch_reports_storage_error() {
        let (backend, _temp) = create_backend(2);
        let query = BuiltQuery::new("SELECT name FROM missing_table", vec![]);
        let err = backend
            .fetch(query, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Storage { .. }));
        assert_eq!(err.public_message(), "database query error");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_interrupts_query() {
        let (backend, _temp) = create_backend(1);
        let endless = BuiltQuery::new(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
             SELECT count(*) FROM c",
            vec![],
        );

        let err = backend
            .fetch(endless, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::StorageTimeout(_)));

        // The interrupted worker hands its connection back, so the single
        // slot frees up well before the query could have finished.
        let conn = tokio::time::timeout(Duration::from_secs(5), backend.pool().acquire())
            .await
            .expect("interrupted query still holds the connection")
            .unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_caller_interrupts_query() {
        let (backend, _temp) = create_backend(1);
        let endless = BuiltQuery::new(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) \
             SELECT count(*) FROM c",
            vec![],
        );

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            backend.fetch(endless, Duration::from_secs(60)),
        )
        .await;
        assert!(abandoned.is_err());

        let reacquired =
            tokio::time::timeout(Duration::from_secs(5), backend.pool().acquire()).await;
        assert!(reacquired.is_ok());
    }
}
