//! Configuration types

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source (CBE listing) configuration
    #[serde(default)]
    pub source: SourceConfig,
    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Read-through cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Ingestion/orchestration policy
    #[serde(default)]
    pub ingest: IngestConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            ingest: IngestConfig::default(),
            settings: AppSettings::default(),
        }
    }
}

/// Source page and WebDriver session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Published auction-results listing page
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
    /// WebDriver endpoint driving the headless browser
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// User agent presented to the source
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bound on page navigation, seconds
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,
    /// Bound on waiting for the results table to render, seconds
    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            webdriver_url: default_webdriver_url(),
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout(),
            render_timeout_secs: default_render_timeout(),
        }
    }
}

fn default_listing_url() -> String {
    "https://www.cbe.org.eg/ar/auctions/egp-t-bills".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.1 Safari/537.36".to_string()
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_render_timeout() -> u64 {
    30
}

/// Which storage adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Postgres,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Path of the embedded database file
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// Postgres connection URL; required when backend = postgres
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection acquire timeout, seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            postgres_url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_sqlite_path() -> String {
    "data/cbe_auctions.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

/// Read-through cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether to wrap the store in the TTL cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry time-to-live, seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    6 * 60 * 60
}

/// Ingestion retry/backoff and cadence policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Fetch attempt ceiling per run
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay; doubled per attempt
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,
    /// Upper bound on a single backoff delay
    #[serde(default = "default_retry_cap")]
    pub retry_cap_ms: u64,
    /// Expected publication cadence; incremental mode skips fetching when
    /// the newest stored record is younger than this
    #[serde(default = "default_cadence_days")]
    pub publication_cadence_days: u32,
    /// Wall-clock budget for one whole run, seconds
    #[serde(default = "default_run_budget")]
    pub run_budget_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base(),
            retry_cap_ms: default_retry_cap(),
            publication_cadence_days: default_cadence_days(),
            run_budget_secs: default_run_budget(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base() -> u64 {
    10_000
}

fn default_retry_cap() -> u64 {
    60_000
}

fn default_cadence_days() -> u32 {
    7
}

fn default_run_budget() -> u64 {
    300
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
