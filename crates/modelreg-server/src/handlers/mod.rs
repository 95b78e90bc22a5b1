//! Request handlers.

pub mod migrations;
pub mod models;
pub mod search;

use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
