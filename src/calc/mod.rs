//! Calculation module - pure yield/tax/profit derivation
//!
//! The engine maps one [`AuctionRecord`](crate::common::types::AuctionRecord)
//! plus one [`CalculationInput`] to a [`CalculationResult`]. No I/O crosses
//! this boundary; results are owned by the caller and recomputed on demand.

mod engine;
mod types;

pub use engine::evaluate;
pub use types::{CalculationInput, CalculationResult, TaxPolicy};
