//! Error types for the model registry and search engine.
//!
//! Every failure a request can hit maps onto one `RegistryError` variant. The
//! HTTP layer only needs [`RegistryError::kind`] to pick a status code and
//! [`RegistryError::public_message`] to build a body that never leaks SQL text
//! or driver detail.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Request validation errors
    #[error("Malformed request: {message}")]
    MalformedRequest { message: String },

    #[error("'{field}' is required")]
    MissingField { field: String },

    #[error("model '{model}' not found")]
    UnknownModel { model: String },

    #[error("field '{field}' not allowed for model '{model}'")]
    FieldNotAllowed { field: String, model: String },

    // Storage errors
    #[error("Query timed out after {0:?}")]
    StorageTimeout(Duration),

    #[error("Database error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Row read error: {message}")]
    RowRead { message: String },

    #[error("Migration {version} failed: {message}")]
    Migration { version: u32, message: String },

    // Model registry errors
    #[error("model '{name}' already exists")]
    ModelAlreadyExists { name: String },

    #[error("model '{name}' not found")]
    ModelNotFound { name: String },

    #[error("cannot delete: model '{name}' in use")]
    ModelInUse { name: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller sent something we refuse to run (400).
    Validation,
    /// Request conflicts with existing state (409).
    Conflict,
    /// Named resource does not exist (404).
    NotFound,
    /// Storage or server-side failure (500).
    Internal,
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(err: rusqlite::Error) -> Self {
        RegistryError::Storage {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RegistryError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RegistryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        RegistryError::Config {
            message: message.into(),
        }
    }

    /// Create a missing-field error.
    pub fn missing(field: impl Into<String>) -> Self {
        RegistryError::MissingField {
            field: field.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::MalformedRequest { .. }
            | RegistryError::MissingField { .. }
            | RegistryError::UnknownModel { .. }
            | RegistryError::FieldNotAllowed { .. } => ErrorKind::Validation,

            RegistryError::ModelAlreadyExists { .. } | RegistryError::ModelInUse { .. } => {
                ErrorKind::Conflict
            }

            RegistryError::ModelNotFound { .. } => ErrorKind::NotFound,

            _ => ErrorKind::Internal,
        }
    }

    /// Message safe to return to a caller.
    ///
    /// Internal failures collapse to a fixed string; the detail only goes to
    /// the server log.
    pub fn public_message(&self) -> String {
        match self {
            RegistryError::MalformedRequest { .. } => "invalid JSON payload".to_string(),
            RegistryError::StorageTimeout(_) | RegistryError::Storage { .. } => {
                "database query error".to_string()
            }
            RegistryError::RowRead { .. } => "row read error".to_string(),
            err => match err.kind() {
                ErrorKind::Internal => "internal server error".to_string(),
                _ => err.to_string(),
            },
        }
    }

    /// True when the failure came from the storage engine.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            RegistryError::StorageTimeout(_)
                | RegistryError::Storage { .. }
                | RegistryError::RowRead { .. }
        )
    }
}
