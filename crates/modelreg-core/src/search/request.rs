//! Search request and response payloads.

use super::record::Record;
use crate::config::SearchConfig;
use crate::{RegistryError, Result};
use serde::{Deserialize, Serialize};

/// Inbound search body.
///
/// Every field defaults, so an absent field surfaces as `MissingField`
/// instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub max_results: Option<i64>,
    /// Accepted for compatibility; matching is always substring based.
    #[serde(default)]
    pub fuzzy: bool,
}

impl SearchRequest {
    /// Decode a request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| RegistryError::MalformedRequest {
            message: e.to_string(),
        })
    }

    /// Reject requests missing a model, a projection or query text.
    pub fn check_required(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(RegistryError::missing("model"));
        }
        if self.fields.is_empty() {
            return Err(RegistryError::missing("fields"));
        }
        if self.query_text.trim().is_empty() {
            return Err(RegistryError::missing("queryText"));
        }
        Ok(())
    }

    pub fn effective_limit(&self) -> u32 {
        clamp_max_results(self.max_results)
    }
}

/// Clamp a requested result count to `(0, MAX_RESULTS_CAP]`.
///
/// Anything outside that range, or absent, becomes the default.
pub fn clamp_max_results(requested: Option<i64>) -> u32 {
    match requested {
        Some(n) if n > 0 && n <= i64::from(SearchConfig::MAX_RESULTS_CAP) => n as u32,
        _ => SearchConfig::DEFAULT_MAX_RESULTS,
    }
}

/// Search results with their count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Record>,
    pub count: usize,
}

impl SearchResponse {
    pub fn new(results: Vec<Record>) -> Self {
        let count = results.len();
        Self { results, count }
    }
}
