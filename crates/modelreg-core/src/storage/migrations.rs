//! Versioned schema migrations.
//!
//! Applied versions are tracked in a single-row `schema_migrations` table.
//! A migration marks the database dirty before it runs and clears the mark
//! once its transaction commits; a dirty database refuses further migration
//! until someone repairs it by hand.

use super::pool::ConnectionPool;
use crate::{RegistryError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// One forward-only schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Current migration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: u32,
    pub dirty: bool,
}

/// Schema of the registry and the demo catalog, in order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_models",
        sql: "CREATE TABLE models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                schema TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );",
    },
    Migration {
        version: 2,
        name: "create_catalog",
        sql: "CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category TEXT,
                price_ugx NUMERIC NOT NULL DEFAULT 0,
                available BOOLEAN NOT NULL DEFAULT 1,
                model_id INTEGER REFERENCES models(id)
            );
            CREATE INDEX idx_items_name ON items(name);

            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'customer'
            );

            CREATE TABLE orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                status TEXT NOT NULL,
                total_cost NUMERIC NOT NULL DEFAULT 0
            );",
    },
];

fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER NOT NULL,
            dirty INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn set_version(conn: &mut Connection, version: u32, dirty: bool) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM schema_migrations", [])?;
    tx.execute(
        "INSERT INTO schema_migrations (version, dirty) VALUES (?1, ?2)",
        params![version, dirty],
    )?;
    tx.commit()?;
    Ok(())
}

/// Read the migration state; version 0 when nothing has been applied.
pub fn status(conn: &Connection) -> Result<MigrationStatus> {
    ensure_table(conn)?;
    let row = conn
        .query_row(
            "SELECT version, dirty FROM schema_migrations LIMIT 1",
            [],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, bool>(1)?)),
        )
        .optional()?;
    Ok(match row {
        Some((version, dirty)) => MigrationStatus { version, dirty },
        None => MigrationStatus {
            version: 0,
            dirty: false,
        },
    })
}

/// Apply every migration newer than the recorded version.
pub fn migrate(conn: &mut Connection, migrations: &[Migration]) -> Result<MigrationStatus> {
    let current = status(conn)?;
    if current.dirty {
        return Err(RegistryError::Migration {
            version: current.version,
            message: "database is dirty; repair it and reset schema_migrations".to_string(),
        });
    }

    let mut pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.version > current.version)
        .collect();
    pending.sort_by_key(|m| m.version);

    if pending.is_empty() {
        debug!("Schema up to date at version {}", current.version);
        return Ok(current);
    }

    for migration in pending {
        set_version(conn, migration.version, true)?;

        let tx = conn.transaction()?;
        if let Err(e) = tx.execute_batch(migration.sql) {
            error!(
                "Migration {} ({}) failed: {}",
                migration.version, migration.name, e
            );
            return Err(RegistryError::Migration {
                version: migration.version,
                message: e.to_string(),
            });
        }
        tx.commit()?;

        set_version(conn, migration.version, false)?;
        info!("Applied migration {} ({})", migration.version, migration.name);
    }

    status(conn)
}

/// Bring the pooled database up to date with [`MIGRATIONS`].
pub async fn run_migrations(pool: &ConnectionPool) -> Result<MigrationStatus> {
    pool.run(|conn| migrate(conn, MIGRATIONS)).await
}

/// Read the migration state of the pooled database.
pub async fn migration_status(pool: &ConnectionPool) -> Result<MigrationStatus> {
    pool.run(|conn| status(conn)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(
            status(&conn).unwrap(),
            MigrationStatus {
                version: 0,
                dirty: false
            }
        );
    }

    #[test]
    fn test_migrate_applies_all_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        let st = migrate(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(st.version, 2);
        assert!(!st.dirty);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('models', 'items', 'users', 'orders')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, MIGRATIONS).unwrap();
        let again = migrate(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(again.version, 2);
    }

    #[test]
    fn test_failed_migration_leaves_dirty_mark() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = [
            MIGRATIONS[0],
            Migration {
                version: 2,
                name: "broken",
                sql: "CREATE TABLE oops (",
            },
        ];
        let err = migrate(&mut conn, &broken).unwrap_err();
        assert!(matches!(err, RegistryError::Migration { version: 2, .. }));
        assert_eq!(
            status(&conn).unwrap(),
            MigrationStatus {
                version: 2,
                dirty: true
            }
        );

        // Dirty databases are not touched again.
        let err = migrate(&mut conn, MIGRATIONS).unwrap_err();
        assert!(matches!(err, RegistryError::Migration { .. }));
    }

    #[tokio::test]
    async fn test_pool_helpers() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pool = ConnectionPool::open(
            temp_dir.path().join("migrate.db"),
            crate::storage::PoolOptions::default(),
        )
        .unwrap();
        assert_eq!(migration_status(&pool).await.unwrap().version, 0);
        run_migrations(&pool).await.unwrap();
        assert_eq!(
            migration_status(&pool).await.unwrap(),
            MigrationStatus {
                version: 2,
                dirty: false
            }
        );
    }
}
