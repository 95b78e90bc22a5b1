//! Registered model metadata.
//!
//! Models are named JSON schemas stored in the `models` table. Catalog rows
//! may reference a model, in which case it cannot be deleted.

mod store;

pub use store::{ModelInfo, ModelStore, RegisterModelRequest};
