//! Bounded pool of SQLite connections.
//!
//! At most `max_open` connections are checked out at once; callers beyond
//! that wait. Returned connections are kept for reuse up to `max_idle`, and
//! any connection older than `max_lifetime` is closed instead of reused.

use crate::config::PoolConfig;
use crate::search::register_search_functions;
use crate::{RegistryError, Result};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Pool sizing and connection settings.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_open: usize,
    pub max_idle: usize,
    pub max_lifetime: Duration,
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_open: PoolConfig::MAX_OPEN,
            max_idle: PoolConfig::MAX_IDLE,
            max_lifetime: PoolConfig::MAX_LIFETIME,
            busy_timeout: PoolConfig::BUSY_TIMEOUT,
        }
    }
}

/// Resolve a `DATABASE_URL` to a SQLite file path.
///
/// Accepts a bare path or a `sqlite://` / `sqlite:` prefixed one.
pub fn database_path_from_url(url: &str) -> Result<PathBuf> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
        .trim();
    if path.is_empty() {
        return Err(RegistryError::config("database URL names no file"));
    }
    Ok(PathBuf::from(path))
}

struct IdleConnection {
    conn: Connection,
    opened_at: Instant,
}

struct PoolInner {
    db_path: PathBuf,
    options: PoolOptions,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection>>,
}

impl PoolInner {
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        register_search_functions(&conn)?;
        debug!("Opened connection to {}", self.db_path.display());
        Ok(conn)
    }

    fn take_idle(&self) -> Option<IdleConnection> {
        let mut idle = self.idle.lock().ok()?;
        while let Some(candidate) = idle.pop() {
            if candidate.opened_at.elapsed() < self.options.max_lifetime {
                return Some(candidate);
            }
            debug!("Closing connection past its max lifetime");
        }
        None
    }

    fn release(&self, conn: Connection, opened_at: Instant) {
        if opened_at.elapsed() >= self.options.max_lifetime {
            return;
        }
        match self.idle.lock() {
            Ok(mut idle) if idle.len() < self.options.max_idle => {
                idle.push(IdleConnection { conn, opened_at });
            }
            Ok(_) => {}
            Err(_) => warn!("Idle connection list poisoned; closing connection"),
        }
    }
}

/// Shared handle to the pool. Cloning is cheap.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool for the database file at `db_path`.
    ///
    /// No connection is opened until the first [`acquire`](Self::acquire).
    pub fn open(db_path: impl Into<PathBuf>, options: PoolOptions) -> Result<Self> {
        let db_path = db_path.into();
        if options.max_open == 0 {
            return Err(RegistryError::config("pool max_open must be at least 1"));
        }

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| RegistryError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        info!(
            "Connection pool for {} (max_open={}, max_idle={})",
            db_path.display(),
            options.max_open,
            options.max_idle
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                permits: Arc::new(Semaphore::new(options.max_open)),
                idle: Mutex::new(Vec::with_capacity(options.max_idle)),
                options,
            }),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Check out a connection, waiting while the pool is saturated.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RegistryError::Storage {
                message: "connection pool closed".to_string(),
                source: None,
            })?;

        let (conn, opened_at) = match self.inner.take_idle() {
            Some(idle) => (idle.conn, idle.opened_at),
            None => {
                // Opening runs PRAGMAs that may wait on the busy timeout.
                let inner = self.inner.clone();
                let conn = tokio::task::spawn_blocking(move || inner.connect())
                    .await
                    .map_err(|e| RegistryError::Storage {
                        message: format!("connection task failed: {}", e),
                        source: None,
                    })??;
                (conn, Instant::now())
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            opened_at,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Run `f` on a pooled connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut *conn))
            .await
            .map_err(|e| RegistryError::Storage {
                message: format!("database task failed: {}", e),
                source: None,
            })?
    }

    /// Verify the database is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    /// Connections that can be checked out without waiting.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// A checked-out connection. Returns itself to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    opened_at: Instant,
    pool: Arc<PoolInner>,
    // Released after `drop` has handed the connection back.
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.opened_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_pool(options: PoolOptions) -> (ConnectionPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(temp_dir.path().join("test.db"), options).unwrap();
        (pool, temp_dir)
    }

    #[test]
    fn test_database_path_from_url() {
        assert_eq!(
            database_path_from_url("sqlite:///var/lib/app.db").unwrap(),
            PathBuf::from("/var/lib/app.db")
        );
        assert_eq!(
            database_path_from_url("sqlite:data/app.db").unwrap(),
            PathBuf::from("data/app.db")
        );
        assert_eq!(
            database_path_from_url("app.db").unwrap(),
            PathBuf::from("app.db")
        );
        assert!(database_path_from_url("sqlite://").is_err());
    }

    #[test]
    fn test_rejects_zero_max_open() {
        let temp_dir = TempDir::new().unwrap();
        let options = PoolOptions {
            max_open: 0,
            ..PoolOptions::default()
        };
        assert!(ConnectionPool::open(temp_dir.path().join("x.db"), options).is_err());
    }

    #[tokio::test]
    async fn test_ping_and_reuse() {
        let (pool, _temp) = create_test_pool(PoolOptions::default());
        pool.ping().await.unwrap();
        assert_eq!(pool.idle_count(), 1);
        pool.ping().await.unwrap();
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.available(), PoolConfig::MAX_OPEN);
    }

    #[tokio::test]
    async fn test_idle_list_is_capped() {
        let (pool, _temp) = create_test_pool(PoolOptions {
            max_open: 4,
            max_idle: 2,
            ..PoolOptions::default()
        });
        let held = vec![
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
        ];
        assert_eq!(pool.available(), 1);
        drop(held);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_saturated() {
        let (pool, _temp) = create_test_pool(PoolOptions {
            max_open: 1,
            ..PoolOptions::default()
        });
        let held = pool.acquire().await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err());

        drop(held);
        let conn = tokio::time::timeout(Duration::from_secs(1), pool.acquire())
            .await
            .unwrap()
            .unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_expired_connections_are_not_reused() {
        let (pool, _temp) = create_test_pool(PoolOptions {
            max_lifetime: Duration::ZERO,
            ..PoolOptions::default()
        });
        pool.ping().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp) = create_test_pool(PoolOptions::default());
        let enabled: i64 = pool
            .run(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_connections_fold_unicode() {
        let (pool, _temp) = create_test_pool(PoolOptions::default());
        let matched: bool = pool
            .run(|conn| {
                Ok(conn.query_row(
                    "SELECT casefold('ÄPFEL Korb') LIKE '%äpfel%'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert!(matched);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_opening_does_not_block_runtime() {
        let (pool, temp) = create_test_pool(PoolOptions {
            busy_timeout: Duration::from_millis(300),
            ..PoolOptions::default()
        });

        // Hold an exclusive lock so the new connection's PRAGMAs wait.
        let locker = Connection::open(temp.path().join("test.db")).unwrap();
        locker
            .execute_batch("CREATE TABLE t(x); BEGIN EXCLUSIVE; INSERT INTO t VALUES (1);")
            .unwrap();

        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            })
        };

        assert!(pool.acquire().await.is_err());
        ticker.abort();
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 5);
        drop(locker);
    }
}
