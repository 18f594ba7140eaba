//! Remote PostgreSQL adapter
//!
//! Suitable for shared, long-lived historical data. The logical schema is
//! identical to the embedded backend so the adapters stay interchangeable;
//! here dates and decimals use the backend's native types. Reads reflect the
//! most recently committed upsert on the primary; replica staleness is the
//! deployment's concern, not this adapter's.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::common::errors::{PipelineError, Result};
use crate::common::traits::AuctionStore;
use crate::common::types::{AuctionRecord, NaturalKey, Tenor};

const INIT_SQL: &str = "\
    CREATE TABLE IF NOT EXISTS auctions (\
        auction_date DATE NOT NULL,\
        tenor_days INTEGER NOT NULL,\
        accepted_yield NUMERIC(9, 6) NOT NULL,\
        price_per_100 NUMERIC(9, 4) NOT NULL,\
        total_accepted_amount NUMERIC(20, 2) NOT NULL,\
        ingested_at TIMESTAMPTZ NOT NULL,\
        PRIMARY KEY (auction_date, tenor_days)\
    )";

const UPSERT_SQL: &str = "\
    INSERT INTO auctions \
        (auction_date, tenor_days, accepted_yield, price_per_100, total_accepted_amount, ingested_at) \
    VALUES ($1, $2, $3, $4, $5, $6) \
    ON CONFLICT (auction_date, tenor_days) DO UPDATE SET \
        accepted_yield = EXCLUDED.accepted_yield, \
        price_per_100 = EXCLUDED.price_per_100, \
        total_accepted_amount = EXCLUDED.total_accepted_amount, \
        ingested_at = EXCLUDED.ingested_at";

const SELECT_COLUMNS: &str = "\
    SELECT auction_date, tenor_days, accepted_yield, price_per_100, total_accepted_amount, ingested_at \
    FROM auctions";

/// Historical store backed by a remote PostgreSQL database
pub struct PostgresAuctionStore {
    pool: PgPool,
}

impl PostgresAuctionStore {
    /// Connect using a `postgres://` URL, typically from the environment
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;
        sqlx::query(INIT_SQL).execute(&pool).await?;
        debug!("postgres schema ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl AuctionStore for PostgresAuctionStore {
    #[instrument(skip(self, records), fields(batch = records.len()))]
    async fn upsert_many(&self, records: &[AuctionRecord]) -> Result<u64> {
        for record in records {
            record.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(UPSERT_SQL)
                .bind(record.auction_date)
                .bind(i32::from(record.tenor.days()))
                .bind(record.accepted_yield)
                .bind(record.price_per_100)
                .bind(record.total_accepted_amount)
                .bind(record.ingested_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "postgres upsert committed");
        Ok(records.len() as u64)
    }

    async fn latest(&self, tenor: Tenor) -> Result<Option<AuctionRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE tenor_days = $1 ORDER BY auction_date DESC LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(i32::from(tenor.days()))
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
            "{SELECT_COLUMNS} WHERE tenor_days = $1 AND auction_date >= $2 AND auction_date <= $3 \
             ORDER BY auction_date ASC, tenor_days ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(i32::from(tenor.days()))
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn exists(&self, key: &NaturalKey) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM auctions WHERE auction_date = $1 AND tenor_days = $2")
            .bind(key.auction_date)
            .bind(i32::from(key.tenor.days()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn latest_auction_date(&self) -> Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT MAX(auction_date) AS auction_date FROM auctions")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(r.try_get::<Option<NaiveDate>, _>("auction_date")?),
            None => Ok(None),
        }
    }
}

fn decode_row(row: &PgRow) -> Result<AuctionRecord> {
    let auction_date: NaiveDate = row.try_get("auction_date")?;
    let tenor_days: i32 = row.try_get("tenor_days")?;
    let tenor = Tenor::from_days(i64::from(tenor_days)).map_err(|_| {
        PipelineError::ConstraintViolation(format!(
            "stored tenor {tenor_days} is outside the fixed set"
        ))
    })?;
    let accepted_yield: Decimal = row.try_get("accepted_yield")?;
    let price_per_100: Decimal = row.try_get("price_per_100")?;
    let total_accepted_amount: Decimal = row.try_get("total_accepted_amount")?;
    let ingested_at: DateTime<Utc> = row.try_get("ingested_at")?;

    Ok(AuctionRecord {
        auction_date,
        tenor,
        accepted_yield,
        price_per_100,
        total_accepted_amount,
        ingested_at,
    })
}
