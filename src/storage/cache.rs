//! Read-through TTL cache over any `AuctionStore`
//!
//! Caches the hot query (`latest` per tenor) in process with a bounded
//! time-to-live. Advisory only: a miss or an expired entry falls through to
//! the backing store, so absence changes latency, never correctness. Writes
//! invalidate affected entries instead of updating them, so a failed or
//! concurrent refresh can never pin a stale value past the TTL.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::common::errors::Result;
use crate::common::traits::AuctionStore;
use crate::common::types::{AuctionRecord, NaturalKey, Tenor};

struct CachedEntry {
    record: AuctionRecord,
    stored_at: Instant,
}

/// Wraps a store with a per-tenor latest-record cache
pub struct CachedStore<S> {
    inner: S,
    ttl: Duration,
    latest_by_tenor: RwLock<HashMap<Tenor, CachedEntry>>,
}

impl<S: AuctionStore> CachedStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            latest_by_tenor: RwLock::new(HashMap::new()),
        }
    }

    /// Access the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: AuctionStore> AuctionStore for CachedStore<S> {
    async fn upsert_many(&self, records: &[AuctionRecord]) -> Result<u64> {
        let written = self.inner.upsert_many(records).await?;

        // Invalidate, not update: the next read repopulates from the store.
        let mut cache = self.latest_by_tenor.write().await;
        for record in records {
            cache.remove(&record.tenor);
        }
        Ok(written)
    }

    async fn latest(&self, tenor: Tenor) -> Result<Option<AuctionRecord>> {
        {
            let cache = self.latest_by_tenor.read().await;
            if let Some(entry) = cache.get(&tenor) {
                if entry.stored_at.elapsed() < self.ttl {
                    debug!(%tenor, "cache hit for latest record");
                    return Ok(Some(entry.record.clone()));
                }
            }
        }

        let fetched = self.inner.latest(tenor).await?;
        if let Some(record) = &fetched {
            let mut cache = self.latest_by_tenor.write().await;
            cache.insert(
                tenor,
                CachedEntry {
                    record: record.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
        Ok(fetched)
    }

    async fn range(
        &self,
        tenor: Tenor,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuctionRecord>> {
        self.inner.range(tenor, from, to).await
    }

    async fn exists(&self, key: &NaturalKey) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn latest_auction_date(&self) -> Result<Option<NaiveDate>> {
        self.inner.latest_auction_date().await
    }
}
