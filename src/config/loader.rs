//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{PipelineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with TBILL_)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // TBILL_STORAGE__POSTGRES_URL=... overrides [storage] postgres_url, etc.
    builder = builder.add_source(
        Environment::with_prefix("TBILL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

    let mut app: AppConfig = config
        .try_deserialize()
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

    // The remote backend conventionally takes its credential from the
    // environment rather than the config file.
    if app.storage.postgres_url.is_none() {
        app.storage.postgres_url = std::env::var("POSTGRES_URL").ok();
    }

    validate(&app)?;
    Ok(app)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut app = AppConfig::default();
    if let Ok(url) = std::env::var("TBILL_LISTING_URL") {
        app.source.listing_url = url;
    }
    if let Ok(url) = std::env::var("WEBDRIVER_URL") {
        app.source.webdriver_url = url;
    }
    if let Ok(path) = std::env::var("TBILL_SQLITE_PATH") {
        app.storage.sqlite_path = path;
    }
    app.storage.postgres_url = std::env::var("POSTGRES_URL").ok();

    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<()> {
    url::Url::parse(&app.source.listing_url)
        .map_err(|e| PipelineError::Configuration(format!("listing_url: {e}")))?;
    url::Url::parse(&app.source.webdriver_url)
        .map_err(|e| PipelineError::Configuration(format!("webdriver_url: {e}")))?;
    if app.ingest.max_attempts == 0 {
        return Err(PipelineError::Configuration(
            "ingest.max_attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}
