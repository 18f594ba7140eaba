//! CBE module - fetcher and parser for the Central Bank of Egypt listing

pub mod fetcher;
pub mod parser;

pub use fetcher::CbeFetcher;
pub use parser::{AuctionParser, ParseOutcome, RejectedRow};
