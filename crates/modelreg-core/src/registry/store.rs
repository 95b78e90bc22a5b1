//! SQLite-backed store of registered models.

use crate::storage::ConnectionPool;
use crate::{RegistryError, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// A row of the `models` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: i64,
    pub name: String,
    pub schema: serde_json::Value,
    pub version: i64,
    pub created_at: String,
}

/// Payload for registering a model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterModelRequest {
    #[serde(default)]
    pub name: String,
    /// JSON schema or free-form metadata. `null` counts as missing.
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
}

const SELECT_COLUMNS: &str = "id, name, schema, version, created_at";

fn row_to_info(row: &Row<'_>) -> rusqlite::Result<ModelInfo> {
    let schema_json: String = row.get(2)?;
    let schema = serde_json::from_str(&schema_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
    })?;
    Ok(ModelInfo {
        id: row.get(0)?,
        name: row.get(1)?,
        schema,
        version: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

/// Decode failures of a stored row are row-read errors, not storage errors.
fn read_error(err: rusqlite::Error) -> RegistryError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..) => {
            warn!("Unreadable model row: {}", err);
            RegistryError::RowRead {
                message: err.to_string(),
            }
        }
        err => err.into(),
    }
}

const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// CRUD over registered model metadata.
#[derive(Clone)]
pub struct ModelStore {
    pool: ConnectionPool,
}

impl ModelStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Insert a new model. Names are unique.
    pub async fn register(&self, request: RegisterModelRequest) -> Result<ModelInfo> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::missing("name"));
        }
        let schema = match request.schema {
            Some(serde_json::Value::Null) | None => return Err(RegistryError::missing("schema")),
            Some(schema) => schema,
        };
        let schema_json = serde_json::to_string(&schema)?;

        self.pool
            .run(move |conn| {
                let inserted = conn.query_row(
                    "INSERT INTO models (name, schema) VALUES (?1, ?2)
                     RETURNING id, version, created_at",
                    params![name, schema_json],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                );
                match inserted {
                    Ok((id, version, created_at)) => {
                        debug!("Registered model: {}", name);
                        Ok(ModelInfo {
                            id,
                            name,
                            schema,
                            version,
                            created_at,
                        })
                    }
                    Err(e) if constraint_code(&e) == Some(SQLITE_CONSTRAINT_UNIQUE) => {
                        Err(RegistryError::ModelAlreadyExists { name })
                    }
                    Err(e) => {
                        error!("RegisterModel error: {}", e);
                        Err(e.into())
                    }
                }
            })
            .await
    }

    /// Fetch one model by name.
    pub async fn get(&self, name: &str) -> Result<ModelInfo> {
        let name = require_name(name)?;
        self.pool
            .run(move |conn| {
                Self::find(conn, &name)?.ok_or(RegistryError::ModelNotFound { name })
            })
            .await
    }

    fn find(conn: &Connection, name: &str) -> Result<Option<ModelInfo>> {
        let sql = format!("SELECT {} FROM models WHERE name = ?1", SELECT_COLUMNS);
        conn.query_row(&sql, params![name], row_to_info)
            .optional()
            .map_err(read_error)
    }

    /// All models, ordered by name.
    pub async fn list(&self) -> Result<Vec<ModelInfo>> {
        self.pool
            .run(|conn| {
                let sql = format!("SELECT {} FROM models ORDER BY name", SELECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_info)?;
                let mut models = Vec::new();
                for row in rows {
                    models.push(row.map_err(read_error)?);
                }
                Ok(models)
            })
            .await
    }

    /// Remove a model. Fails while catalog rows still reference it.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let name = require_name(name)?;
        self.pool
            .run(move |conn| {
                match conn.execute("DELETE FROM models WHERE name = ?1", params![name]) {
                    Ok(0) => Err(RegistryError::ModelNotFound { name }),
                    Ok(_) => {
                        debug!("Deleted model: {}", name);
                        Ok(())
                    }
                    Err(e) if constraint_code(&e) == Some(SQLITE_CONSTRAINT_FOREIGNKEY) => {
                        Err(RegistryError::ModelInUse { name })
                    }
                    Err(e) => {
                        error!("DeleteModel error: {}", e);
                        Err(e.into())
                    }
                }
            })
            .await
    }
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::missing("name"));
    }
    Ok(name.to_string())
}
