//! Migration status endpoint.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{extract::State, Json};
use modelreg_core::storage::{migration_status, MigrationStatus};
use std::sync::Arc;

pub async fn handle_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MigrationStatus>, ApiError> {
    Ok(Json(migration_status(&state.pool).await?))
}
