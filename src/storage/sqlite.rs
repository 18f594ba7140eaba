//! Embedded SQLite adapter
//!
//! Suitable for single-process, offline use: the whole historical dataset
//! lives in one local file. Decimal columns are stored as TEXT because the
//! sqlx sqlite driver has no native decimal mapping; values round-trip
//! through `Decimal`'s canonical string form.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::common::errors::{PipelineError, Result};
use crate::common::traits::AuctionStore;
use crate::common::types::{AuctionRecord, NaturalKey, Tenor};

const INIT_SQL: &str = "\
    CREATE TABLE IF NOT EXISTS auctions (\
        auction_date TEXT NOT NULL,\
        tenor_days INTEGER NOT NULL,\
        accepted_yield TEXT NOT NULL,\
        price_per_100 TEXT NOT NULL,\
        total_accepted_amount TEXT NOT NULL,\
        ingested_at TEXT NOT NULL,\
        PRIMARY KEY (auction_date, tenor_days)\
    )";

const UPSERT_SQL: &str = "\
    INSERT INTO auctions \
        (auction_date, tenor_days, accepted_yield, price_per_100, total_accepted_amount, ingested_at) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
    ON CONFLICT (auction_date, tenor_days) DO UPDATE SET \
        accepted_yield = excluded.accepted_yield, \
        price_per_100 = excluded.price_per_100, \
        total_accepted_amount = excluded.total_accepted_amount, \
        ingested_at = excluded.ingested_at";

const SELECT_COLUMNS: &str = "\
    SELECT auction_date, tenor_days, accepted_yield, price_per_100, total_accepted_amount, ingested_at \
    FROM auctions";

/// Historical store backed by a single local SQLite file
pub struct SqliteAuctionStore {
    pool: SqlitePool,
}

impl SqliteAuctionStore {
    /// Open (and create if missing) the database file at `path`
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        // One writer connection serializes concurrent upserts; last commit wins.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// In-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(PipelineError::from)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(INIT_SQL).execute(&pool).await?;
        debug!("sqlite schema ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl AuctionStore for SqliteAuctionStore {
    #[instrument(skip(self, records), fields(batch = records.len()))]
    async fn upsert_many(&self, records: &[AuctionRecord]) -> Result<u64> {
        for record in records {
            record.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(UPSERT_SQL)
                .bind(record.auction_date)
                .bind(i64::from(record.tenor.days()))
                .bind(record.accepted_yield.to_string())
                .bind(record.price_per_100.to_string())
                .bind(record.total_accepted_amount.to_string())
                .bind(record.ingested_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "sqlite upsert committed");
        Ok(records.len() as u64)
    }

    async fn latest(&self, tenor: Tenor) -> Result<Option<AuctionRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE tenor_days = ?1 ORDER BY auction_date DESC LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(i64::from(tenor.days()))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_row(&r)).transpose()
    }

    async fn range(
        &self,
        tenor: Tenor,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AuctionRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE tenor_days = ?1 AND auction_date >= ?2 AND auction_date <= ?3 \
             ORDER BY auction_date ASC, tenor_days ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(tenor.days()))
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn exists(&self, key: &NaturalKey) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM auctions WHERE auction_date = ?1 AND tenor_days = ?2")
            .bind(key.auction_date)
            .bind(i64::from(key.tenor.days()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn latest_auction_date(&self) -> Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT auction_date FROM auctions ORDER BY auction_date DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get("auction_date").map_err(PipelineError::from))
            .transpose()
    }
}

fn decode_row(row: &SqliteRow) -> Result<AuctionRecord> {
    let auction_date: NaiveDate = row.try_get("auction_date")?;
    let tenor_days: i64 = row.try_get("tenor_days")?;
    let tenor = Tenor::from_days(tenor_days).map_err(|_| {
        PipelineError::ConstraintViolation(format!(
            "stored tenor {tenor_days} is outside the fixed set"
        ))
    })?;
    let ingested_at: DateTime<Utc> = row.try_get("ingested_at")?;

    Ok(AuctionRecord {
        auction_date,
        tenor,
        accepted_yield: decode_decimal(row, "accepted_yield")?,
        price_per_100: decode_decimal(row, "price_per_100")?,
        total_accepted_amount: decode_decimal(row, "total_accepted_amount")?,
        ingested_at,
    })
}

fn decode_decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| {
        PipelineError::ConstraintViolation(format!("stored {column} '{raw}' is not a decimal: {e}"))
    })
}
