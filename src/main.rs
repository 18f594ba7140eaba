//! tbill_tracker - Main Entry Point
//!
//! Runs one ingestion pass against the CBE auction listing and prints the
//! structured report. Intended to be invoked on a schedule (cron) or on
//! demand with `--force-refresh`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tbill_tracker::common::traits::AuctionStore;
use tbill_tracker::config::types::StorageBackend;
use tbill_tracker::config::{load_config, AppConfig};
use tbill_tracker::ingest::{IngestionReport, Orchestrator, RunContext};
use tbill_tracker::storage::{CachedStore, PostgresAuctionStore, SqliteAuctionStore};
use tbill_tracker::CbeFetcher;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Re-fetch and re-parse even if stored data looks current
    #[arg(long)]
    force_refresh: bool,

    /// Storage backend override (sqlite, postgres)
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut cfg = load_config(Some(&args.config)).context("loading configuration")?;
    if let Some(backend) = &args.backend {
        cfg.storage.backend = match backend.to_lowercase().as_str() {
            "sqlite" => StorageBackend::Sqlite,
            "postgres" => StorageBackend::Postgres,
            other => bail!("unknown storage backend '{other}'"),
        };
    }

    info!(backend = ?cfg.storage.backend, force_refresh = args.force_refresh, "starting ingestion run");

    let report = match cfg.storage.backend {
        StorageBackend::Sqlite => {
            let store = SqliteAuctionStore::connect(&cfg.storage.sqlite_path)
                .await
                .context("opening embedded store")?;
            run_ingestion(store, &cfg, args.force_refresh).await?
        }
        StorageBackend::Postgres => {
            let url = cfg
                .storage
                .postgres_url
                .clone()
                .context("postgres backend selected but no POSTGRES_URL configured")?;
            let store = PostgresAuctionStore::connect(
                &url,
                cfg.storage.max_connections,
                Duration::from_secs(cfg.storage.connect_timeout_secs),
            )
            .await
            .context("connecting to remote store")?;
            run_ingestion(store, &cfg, args.force_refresh).await?
        }
    };

    // The report is the machine-readable contract with whatever scheduled us.
    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("{}", report.summary());

    std::process::exit(report.exit_code());
}

async fn run_ingestion<D: AuctionStore>(
    store: D,
    cfg: &AppConfig,
    force_refresh: bool,
) -> Result<IngestionReport> {
    let fetcher = CbeFetcher::new(cfg.source.clone());
    let mut ctx = RunContext::new();

    let report = if cfg.cache.enabled {
        let cached = CachedStore::new(store, Duration::from_secs(cfg.cache.ttl_secs));
        let orchestrator = Orchestrator::new(fetcher, cached, cfg.ingest.clone());
        orchestrator.run(force_refresh, &mut ctx).await?
    } else {
        let orchestrator = Orchestrator::new(fetcher, store, cfg.ingest.clone());
        orchestrator.run(force_refresh, &mut ctx).await?
    };
    Ok(report)
}
