use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{PrimaryFeed, PrimaryTicker};
use crate::{PriceError, Ticker};

const BASE_API: &str = "https://api.binance.com";
const QUOTE_SUFFIX: &str = "USDT";
const TIMEOUT: Duration = Duration::from_secs(5);

// https://developers.binance.com/docs/binance-spot-api-docs/errors
const INVALID_SYMBOL: i64 = -1121;

#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_api: String,
}

impl BinanceClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(BASE_API)
    }

    pub fn with_base_url(base_api: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(TIMEOUT).build()?;

        Ok(Self {
            client,
            base_api: base_api.into(),
        })
    }

    /// Trading pair for a ticker, e.g. `BTC` -> `BTCUSDT`.
    pub fn pair(ticker: &Ticker) -> String {
        format!("{}{}", ticker.as_str(), QUOTE_SUFFIX)
    }
}

#[async_trait]
impl PrimaryFeed for BinanceClient {
    async fn ticker_24h(&self, pair: &str) -> Result<PrimaryTicker, PriceError> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_api.trim_end_matches('/'));

        let res = self
            .client
            .get(url)
            .query(&[("symbol", pair)])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        parse_ticker(&body)
    }
}

//
// Match Binance API JSON
// https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints
//
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    price_change_percent: Option<String>,
    close_time: Option<i64>,
}

fn classify_error(status: StatusCode, body: &str) -> PriceError {
    if let Ok(err) = serde_json::from_str::<ApiError>(body)
        && err.code == INVALID_SYMBOL
    {
        return PriceError::UpstreamNotFound(err.msg);
    }
    PriceError::from_status(status, body)
}

fn parse_ticker(body: &str) -> Result<PrimaryTicker, PriceError> {
    let raw: Ticker24h = serde_json::from_str(body)?;

    let last_price = raw
        .last_price
        .parse::<f64>()
        .map_err(|e| PriceError::UpstreamMalformed(format!("lastPrice: {e}")))?;

    let change_percent = match raw.price_change_percent {
        Some(s) => Some(
            s.parse::<f64>()
                .map_err(|e| PriceError::UpstreamMalformed(format!("priceChangePercent: {e}")))?,
        ),
        None => None,
    };

    let as_of = raw
        .close_time
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(PrimaryTicker {
        last_price,
        change_percent,
        as_of,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_appends_quote_currency() {
        let t = Ticker::new("btc").unwrap();
        assert_eq!(BinanceClient::pair(&t), "BTCUSDT");
    }

    #[test]
    fn test_parse_ticker() {
        let body = r#"{"symbol":"BTCUSDT","lastPrice":"67123.45000000",
            "priceChangePercent":"-1.234","closeTime":1700000000000}"#;
        let t = parse_ticker(body).unwrap();

        assert_eq!(t.last_price, 67123.45);
        assert_eq!(t.change_percent, Some(-1.234));
        assert_eq!(t.as_of.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_ticker_rejects_garbage_price() {
        let body = r#"{"lastPrice":"abc"}"#;
        assert!(matches!(
            parse_ticker(body),
            Err(PriceError::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_invalid_symbol_is_not_found() {
        let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
        let e = classify_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(e, PriceError::UpstreamNotFound(ref m) if m == "Invalid symbol."));
    }

    #[test]
    fn test_other_errors_use_status() {
        let e = classify_error(StatusCode::SERVICE_UNAVAILABLE, "<html>");
        assert!(e.is_transient());

        let e = classify_error(StatusCode::BAD_REQUEST, r#"{"code":-1100,"msg":"Illegal"}"#);
        assert!(matches!(e, PriceError::UpstreamRejected(StatusCode::BAD_REQUEST)));
    }
}
