//! Core types shared across the ingestion pipeline

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{PipelineError, Result};

/// Fixed set of treasury-bill maturities published by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Tenor {
    Days91,
    Days182,
    Days273,
    Days364,
}

impl Tenor {
    /// All tenors, ascending
    pub const ALL: [Tenor; 4] = [Tenor::Days91, Tenor::Days182, Tenor::Days273, Tenor::Days364];

    /// Maturity period in days
    pub fn days(self) -> u16 {
        match self {
            Tenor::Days91 => 91,
            Tenor::Days182 => 182,
            Tenor::Days273 => 273,
            Tenor::Days364 => 364,
        }
    }

    /// Parse a day count into a tenor, rejecting anything outside the fixed set
    pub fn from_days(days: i64) -> Result<Tenor> {
        match days {
            91 => Ok(Tenor::Days91),
            182 => Ok(Tenor::Days182),
            273 => Ok(Tenor::Days273),
            364 => Ok(Tenor::Days364),
            other => Err(PipelineError::ValueParse {
                column: "tenor".to_string(),
                message: format!("{other} days is not a recognized tenor"),
            }),
        }
    }
}

impl From<Tenor> for u16 {
    fn from(tenor: Tenor) -> u16 {
        tenor.days()
    }
}

impl TryFrom<u16> for Tenor {
    type Error = PipelineError;

    fn try_from(days: u16) -> Result<Tenor> {
        Tenor::from_days(i64::from(days))
    }
}

impl std::fmt::Display for Tenor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// Unique identity of one auction result: (session date, tenor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub auction_date: NaiveDate,
    pub tenor: Tenor,
}

impl NaturalKey {
    pub fn new(auction_date: NaiveDate, tenor: Tenor) -> Self {
        Self { auction_date, tenor }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.auction_date, self.tenor)
    }
}

/// One published auction result for one tenor on one date
///
/// `accepted_yield` is the weighted-average accepted annual yield as a
/// fraction (0.275 = 27.5%); the parser normalizes the source's percentage
/// figures at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Auction session date
    pub auction_date: NaiveDate,
    /// Instrument maturity
    pub tenor: Tenor,
    /// Annual yield as a fraction, strictly positive
    pub accepted_yield: Decimal,
    /// Discounted price per 100 face value
    pub price_per_100: Decimal,
    /// Total accepted amount, EGP
    pub total_accepted_amount: Decimal,
    /// When this record was scraped
    pub ingested_at: DateTime<Utc>,
}

impl AuctionRecord {
    /// Natural key of this record
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.auction_date, self.tenor)
    }

    /// Redemption date implied by the session date and tenor
    pub fn maturity_date(&self) -> NaiveDate {
        self.auction_date + Duration::days(i64::from(self.tenor.days()))
    }

    /// Check the record invariants.
    ///
    /// Called by the parser before a row is accepted and by the storage
    /// adapters before a write, so an invalid record can never reach a
    /// backend regardless of where it originated.
    pub fn validate(&self) -> Result<()> {
        if self.accepted_yield <= Decimal::ZERO {
            return Err(PipelineError::ConstraintViolation(format!(
                "{}: accepted_yield must be positive, got {}",
                self.key(),
                self.accepted_yield
            )));
        }
        if self.price_per_100 <= Decimal::ZERO || self.price_per_100 > Decimal::ONE_HUNDRED {
            return Err(PipelineError::ConstraintViolation(format!(
                "{}: price_per_100 must be in (0, 100], got {}",
                self.key(),
                self.price_per_100
            )));
        }
        if self.total_accepted_amount < Decimal::ZERO {
            return Err(PipelineError::ConstraintViolation(format!(
                "{}: total_accepted_amount must not be negative, got {}",
                self.key(),
                self.total_accepted_amount
            )));
        }
        Ok(())
    }
}

/// Raw table markup captured from the source page
///
/// Produced by the fetcher, consumed by the parser, never persisted.
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Full page source at capture time
    pub html: String,
    /// Capture timestamp
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }
}
