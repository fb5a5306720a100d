// --- File: crates/rendezvous_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to a call when the caller does not send `x-request-timeout-ms`.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite://data/rendezvous.db, or "memory:" for the in-process store
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

// --- Firebase Cloud Messaging Config ---
// project_id and the service account key path are not secret; the key file itself is.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub key_path: Option<String>,
    /// Overrides https://fcm.googleapis.com (used against emulators and in tests).
    #[serde(default)]
    pub api_base_url: Option<String>,
}

// --- Reverse Geocoding Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeocodingConfig {
    pub base_url: String, // Nominatim-compatible endpoint
    pub user_agent: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NearbyConfig {
    /// Result limit when the caller does not send one.
    #[serde(default = "default_nearby_limit")]
    pub default_limit: usize,
    /// Upper bound on candidate rows pulled from the store before distance filtering.
    #[serde(default = "default_candidate_scan_cap")]
    pub candidate_scan_cap: usize,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            default_limit: default_nearby_limit(),
            candidate_scan_cap: default_candidate_scan_cap(),
        }
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BulkConfig {
    #[serde(default = "default_bulk_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_bulk_concurrency(),
        }
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub max_age_days: i64,
    /// When set, the backend sweeps on this interval in addition to the DELETE endpoint.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_retention_days(),
            sweep_interval_secs: None,
        }
    }
}

// --- Retry policy for store and gateway calls ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_firebase: bool,
    #[serde(default)]
    pub use_geocoding: bool,

    // --- Optional Integrations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub geocoding: Option<GeocodingConfig>,

    // --- Tuning (always present, defaulted) ---
    #[serde(default)]
    pub nearby: NearbyConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_connections() -> u32 {
    5
}
fn default_nearby_limit() -> usize {
    50
}
fn default_candidate_scan_cap() -> usize {
    5_000
}
fn default_bulk_concurrency() -> usize {
    8
}
fn default_retention_days() -> i64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    2_000
}
fn default_true() -> bool {
    true
}
