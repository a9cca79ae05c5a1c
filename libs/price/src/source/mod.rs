//! Upstream price feeds.
//!
//! The resolver and the identifier cache only see the traits below, so tests
//! can swap the HTTP clients for in-memory fakes.

mod binance;
mod coingecko;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::PriceError;

pub use binance::BinanceClient;
pub use coingecko::CoinGeckoClient;

/// 24h ticker as reported by the Primary feed.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryTicker {
    pub last_price: f64,
    pub change_percent: Option<f64>,
    pub as_of: DateTime<Utc>,
}

/// Spot price as reported by the Secondary feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryPrice {
    pub usd: f64,
    pub change_24h: Option<f64>,
    pub as_of: Option<DateTime<Utc>>,
}

/// One row of the Secondary feed's symbol directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: String,
    pub symbol: String,
}

/// Exchange ticker endpoint, queried by trading pair.
#[async_trait]
pub trait PrimaryFeed: Send + Sync {
    /// `UpstreamNotFound` when the pair does not exist.
    async fn ticker_24h(&self, pair: &str) -> Result<PrimaryTicker, PriceError>;
}

/// Aggregator endpoint, queried by its own identifier.
#[async_trait]
pub trait SecondaryFeed: Send + Sync {
    /// `Ok(None)` when the identifier is absent from the response.
    async fn simple_price(&self, id: &str) -> Result<Option<SecondaryPrice>, PriceError>;
}

/// Bulk symbol to identifier listing.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn load_directory(&self) -> Result<Vec<DirectoryEntry>, PriceError>;
}
