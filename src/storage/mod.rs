//! Storage module - interchangeable adapters for the auction store port

pub mod cache;
pub mod postgres;
pub mod sqlite;

pub use cache::CachedStore;
pub use postgres::PostgresAuctionStore;
pub use sqlite::SqliteAuctionStore;
