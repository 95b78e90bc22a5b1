//! Modelreg Server - HTTP surface for the model registry and search engine.
//!
//! Public routes run allow-listed searches. Admin routes manage registered
//! models and are guarded by an HS256 bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start_server, AppState};
