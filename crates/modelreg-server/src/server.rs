//! HTTP server implementation using Axum.

use crate::auth::require_jwt;
use crate::handlers::{handle_health, migrations, models, search};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use modelreg_core::config::ServerConfig;
use modelreg_core::registry::ModelStore;
use modelreg_core::search::{AllowList, SearchEngine};
use modelreg_core::storage::{ConnectionPool, SqliteBackend};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Allow-listed search over the catalog
    pub engine: SearchEngine,
    /// Registered model metadata
    pub models: ModelStore,
    /// Pool behind both, used for migration status
    pub pool: ConnectionPool,
    /// HS256 secret for admin tokens; admin routes fail closed without it
    pub jwt_secret: Option<String>,
}

impl AppState {
    pub fn new(pool: ConnectionPool, allow_list: AllowList, jwt_secret: Option<String>) -> Self {
        let engine = SearchEngine::new(
            Arc::new(allow_list),
            Arc::new(SqliteBackend::new(pool.clone())),
        );
        Self {
            engine,
            models: ModelStore::new(pool.clone()),
            pool,
            jwt_secret: jwt_secret.filter(|s| !s.is_empty()),
        }
    }
}

/// Build the full router: public search routes and the guarded admin API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/models/register", post(models::handle_register))
        .route("/models/get", get(models::handle_get))
        .route("/models/list", get(models::handle_list))
        .route("/models/delete", delete(models::handle_delete))
        .route("/migrations/status", get(migrations::handle_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_jwt));

    // Configure CORS for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(search::handle_query))
        .route("/search", post(search::handle_search))
        .nest("/admin", admin)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(ServerConfig::REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: Arc<AppState>, address: &str) -> anyhow::Result<SocketAddr> {
    let app = build_router(state);

    let addr: SocketAddr = address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
