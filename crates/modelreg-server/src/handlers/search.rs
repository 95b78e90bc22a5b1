//! Search endpoints.
//!
//! Bodies are taken as raw bytes so that decode failures map to the
//! registry's own `MalformedRequest` instead of axum's rejection text.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{body::Bytes, extract::State, Json};
use modelreg_core::search::{Record, SearchRequest, SearchResponse};
use std::sync::Arc;

async fn run_search(state: &AppState, body: &[u8]) -> Result<SearchResponse, ApiError> {
    let request = SearchRequest::from_json(body)?;
    Ok(state.engine.search(&request).await?)
}

/// `POST /query`: matching rows as a bare array.
pub async fn handle_query(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Vec<Record>>, ApiError> {
    let response = run_search(&state, &body).await?;
    Ok(Json(response.results))
}

/// `POST /search`: matching rows with their count.
pub async fn handle_search(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(run_search(&state, &body).await?))
}
