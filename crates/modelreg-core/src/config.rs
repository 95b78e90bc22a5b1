//! Centralized configuration constants.
//!
//! Runtime settings (database location, listen address, secrets) come from the
//! server's command line and environment; the values here are the fixed limits
//! and defaults the engine applies regardless of deployment.

use std::time::Duration;

/// Search endpoint limits.
pub struct SearchConfig;

impl SearchConfig {
    pub const DEFAULT_MAX_RESULTS: u32 = 10;
    pub const MAX_RESULTS_CAP: u32 = 100;
    /// Deadline for a single search, measured from dispatch.
    pub const QUERY_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_PRIMARY_COLUMN: &'static str = "name";
    pub const DEFAULT_SECONDARY_COLUMN: &'static str = "category";
}

/// Connection pool sizing.
pub struct PoolConfig;

impl PoolConfig {
    pub const MAX_OPEN: usize = 20;
    pub const MAX_IDLE: usize = 5;
    pub const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
}

/// HTTP server defaults.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_ADDRESS: &'static str = "127.0.0.1:5000";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const TOKEN_TTL_HOURS: i64 = 24;
    pub const TOKEN_SUBJECT: &'static str = "admin";
    /// Clock skew tolerated when checking token expiry, in seconds.
    pub const JWT_LEEWAY_SECS: u64 = 30;
}
