use std::sync::Arc;

use chrono_tz::Tz;
use price::{GoldClient, SourceFallbackResolver, StockClient, Ticker};

pub mod bridge;
pub mod command;
pub mod config;
pub mod daily;
pub mod delivery;
pub mod schedule;
pub mod webhook;

/// Everything a job needs to produce its reply.
pub struct Data {
    pub resolver: Arc<SourceFallbackResolver>,
    pub gold: Arc<GoldClient>,
    pub stock: Arc<StockClient>,
    pub watchlist: Vec<Ticker>,
    pub timezone: Tz,
    pub version: String,
}
