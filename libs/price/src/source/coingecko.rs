use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::{DirectoryEntry, DirectorySource, SecondaryFeed, SecondaryPrice};
use crate::PriceError;

const BASE_API: &str = "https://api.coingecko.com";
const PRICE_TIMEOUT: Duration = Duration::from_secs(5);
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Public tier allows roughly 30 calls a minute.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1200);

pub struct CoinGeckoClient {
    client: Client,
    base_api: String,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(BASE_API)
    }

    pub fn with_base_url(base_api: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_api: base_api.into(),
            min_interval: DEFAULT_MIN_INTERVAL,
            last_call: Mutex::new(None),
        })
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_api.trim_end_matches('/'), path)
    }

    /// Hold the caller until `min_interval` has passed since the previous call.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "pacing secondary feed"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn get_text(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<String, PriceError> {
        self.pace().await;

        let res = self
            .client
            .get(self.url(path))
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(PriceError::from_status(status, &body));
        }

        Ok(body)
    }
}

//
// Match CoinGecko API JSON
// https://docs.coingecko.com/reference/simple-price
//
#[derive(Debug, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    last_updated_at: Option<i64>,
}

#[async_trait]
impl SecondaryFeed for CoinGeckoClient {
    async fn simple_price(&self, id: &str) -> Result<Option<SecondaryPrice>, PriceError> {
        let body = self
            .get_text(
                "/api/v3/simple/price",
                &[
                    ("ids", id),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                    ("include_last_updated_at", "true"),
                ],
                PRICE_TIMEOUT,
            )
            .await?;

        parse_simple_price(&body, id)
    }
}

#[async_trait]
impl DirectorySource for CoinGeckoClient {
    async fn load_directory(&self) -> Result<Vec<DirectoryEntry>, PriceError> {
        let body = self
            .get_text("/api/v3/coins/list", &[], DIRECTORY_TIMEOUT)
            .await?;

        parse_directory(&body)
    }
}

fn parse_simple_price(body: &str, id: &str) -> Result<Option<SecondaryPrice>, PriceError> {
    let mut prices: HashMap<String, SimplePrice> = serde_json::from_str(body)?;

    let Some(entry) = prices.remove(id) else {
        return Ok(None);
    };
    let Some(usd) = entry.usd else {
        return Ok(None);
    };

    Ok(Some(SecondaryPrice {
        usd,
        change_24h: entry.usd_24h_change,
        as_of: entry
            .last_updated_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    }))
}

fn parse_directory(body: &str) -> Result<Vec<DirectoryEntry>, PriceError> {
    let entries: Vec<CoinListEntry> = serde_json::from_str(body)?;

    Ok(entries
        .into_iter()
        .map(|e| DirectoryEntry {
            id: e.id,
            symbol: e.symbol,
        })
        .collect())
}
