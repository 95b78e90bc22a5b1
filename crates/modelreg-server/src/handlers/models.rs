//! Admin endpoints for registered models.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use modelreg_core::registry::{ModelInfo, RegisterModelRequest};
use modelreg_core::RegistryError;
use serde::Deserialize;
use std::sync::Arc;

/// `?name=` query parameter. Absent counts as empty so the store reports it
/// as a missing field.
#[derive(Debug, Deserialize)]
pub struct NameParams {
    #[serde(default)]
    pub name: String,
}

pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ModelInfo>), ApiError> {
    let request: RegisterModelRequest =
        serde_json::from_slice(&body).map_err(|e| RegistryError::MalformedRequest {
            message: e.to_string(),
        })?;
    let info = state.models.register(request).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn handle_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NameParams>,
) -> Result<Json<ModelInfo>, ApiError> {
    Ok(Json(state.models.get(&params.name).await?))
}

pub async fn handle_list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    Ok(Json(state.models.list().await?))
}

pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NameParams>,
) -> Result<StatusCode, ApiError> {
    state.models.delete(&params.name).await?;
    Ok(StatusCode::NO_CONTENT)
}
