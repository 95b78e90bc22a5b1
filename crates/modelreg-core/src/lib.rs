//! Modelreg Core - Model registry and allow-listed search over SQLite.
//!
//! This crate provides the storage and search layer used by the HTTP server.
//! It can be used programmatically without any HTTP layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelreg_core::search::{AllowList, SearchEngine, SearchRequest};
//! use modelreg_core::storage::{run_migrations, ConnectionPool, PoolOptions, SqliteBackend};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> modelreg_core::Result<()> {
//!     let pool = ConnectionPool::open("registry.db", PoolOptions::default())?;
//!     run_migrations(&pool).await?;
//!
//!     let engine = SearchEngine::new(
//!         Arc::new(AllowList::default_catalog()),
//!         Arc::new(SqliteBackend::new(pool)),
//!     );
//!     let request = SearchRequest::from_json(
//!         br#"{"model": "items", "fields": ["name"], "queryText": "laptop stand"}"#,
//!     )?;
//!     let response = engine.search(&request).await?;
//!     println!("Found {} items", response.count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod search;
pub mod storage;

pub use error::{ErrorKind, RegistryError, Result};
