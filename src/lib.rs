//! tbill_tracker Library
//!
//! A Rust library for ingesting Central Bank of Egypt treasury-bill auction
//! results into durable storage and deriving investor yield metrics.

pub mod calc;
pub mod cbe;
pub mod common;
pub mod config;
pub mod ingest;
pub mod storage;

// Re-export commonly used types
pub use calc::{evaluate, CalculationInput, CalculationResult, TaxPolicy};
pub use cbe::{AuctionParser, CbeFetcher, ParseOutcome, RejectedRow};
pub use common::errors::{PipelineError, Result};
pub use common::traits::{AuctionStore, YieldSource};
pub use common::types::{AuctionRecord, NaturalKey, RawPayload, Tenor};
pub use config::types::AppConfig;
pub use ingest::{IngestionReport, Orchestrator, RunContext, RunOutcome, RunState};
pub use storage::{CachedStore, PostgresAuctionStore, SqliteAuctionStore};
