//! Port traits decoupling ingestion from the physical source and storage

use async_trait::async_trait;
use chrono::NaiveDate;

use super::errors::Result;
use super::types::{AuctionRecord, NaturalKey, RawPayload, Tenor};

/// Anything that can produce the latest auction listing as raw markup.
///
/// A fetch attempt is atomic: implementations either return a complete
/// payload or an error, never a partial extraction. Implementations own
/// their session lifecycle and must release it on every exit path.
#[async_trait]
pub trait YieldSource: Send + Sync {
    /// Fetch the current listing page.
    ///
    /// # Errors
    /// * `SourceUnavailable` - network or transport failure
    /// * `SourceRenderTimeout` - dynamic content never materialized
    /// * `SourceBlocked` - the source refused the request; not retryable
    async fn fetch_latest_listing(&self) -> Result<RawPayload>;
}

/// Storage port for the historical auction dataset.
///
/// Both the embedded and the remote adapter implement identical
/// upsert-by-natural-key semantics, so they are interchangeable and
/// replaying the same batch sequence yields the same logical dataset.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Insert or update records by natural key, transactionally.
    ///
    /// Either every record in the batch is committed or none is; readers
    /// never observe a torn write. Returns the number of records written.
    async fn upsert_many(&self, records: &[AuctionRecord]) -> Result<u64>;

    /// Most recent record for the given tenor, if any
    async fn latest(&self, tenor: Tenor) -> Result<Option<AuctionRecord>>;

    /// Records for a tenor within `[from, to]`, ascending by auction date
    /// (ties broken by tenor)
    async fn range(&self, tenor: Tenor, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<AuctionRecord>>;

    /// Whether a record with this natural key exists
    async fn exists(&self, key: &NaturalKey) -> Result<bool>;

    /// Newest auction date across all tenors; drives incremental mode
    async fn latest_auction_date(&self) -> Result<Option<NaiveDate>>;
}
