//! SQLite storage: pooled connections, deadline-bounded queries and schema
//! migrations.

mod backend;
mod migrations;
mod pool;

pub use backend::{execute, SearchBackend, SqliteBackend};
pub use migrations::{
    migrate, migration_status, run_migrations, status, Migration, MigrationStatus, MIGRATIONS,
};
pub use pool::{database_path_from_url, ConnectionPool, PoolOptions, PooledConnection};
