//! Mapping of registry errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use modelreg_core::{ErrorKind, RegistryError};
use serde_json::json;
use tracing::error;

/// An error on its way to the client: a status and a message that is safe
/// to show. Rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    /// The admin API is enabled but no signing secret is configured.
    pub fn misconfigured() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server misconfiguration")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self::new(status, err.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RegistryError::missing("model"), StatusCode::BAD_REQUEST),
            (
                RegistryError::UnknownModel {
                    model: "vault".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::ModelAlreadyExists {
                    name: "Product".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::ModelNotFound {
                    name: "Product".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                RegistryError::StorageTimeout(Duration::from_secs(2)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ApiError::from(RegistryError::Storage {
            message: "no such table: secrets".into(),
            source: None,
        });
        assert_eq!(err.message(), "database query error");
    }

    #[test]
    fn test_validation_message_is_kept() {
        let err = ApiError::from(RegistryError::missing("queryText"));
        assert_eq!(err.message(), "'queryText' is required");
    }
}
