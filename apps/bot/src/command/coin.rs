use ::price::Ticker;
use tracing::info;

use crate::Data;

pub async fn coin(data: &Data) -> String {
    if data.watchlist.is_empty() {
        return "No coins are on the watchlist.".to_string();
    }

    let results = data.resolver.quote_all(&data.watchlist).await;
    let resolved = results.iter().filter(|r| r.is_ok()).count();
    info!(symbols = results.len(), resolved, "watchlist resolved");

    let lines: Vec<String> = results
        .into_iter()
        .map(|r| match r {
            Ok(quote) => quote.to_string(),
            Err(failure) => failure.user_message(),
        })
        .collect();

    format!("COIN PRICES\n\n{}", lines.join("\n"))
}

pub async fn price(data: &Data, ticker: Option<&Ticker>) -> String {
    let Some(ticker) = ticker else {
        return "Usage: /price BTC".to_string();
    };

    match data.resolver.quote(ticker).await {
        Ok(quote) => quote.to_string(),
        Err(failure) => failure.user_message(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use ::price::source::{
        DirectoryEntry, DirectorySource, PrimaryFeed, PrimaryTicker, SecondaryFeed,
        SecondaryPrice,
    };
    use ::price::{
        GoldClient, IdentifierCache, PriceError, RetryPolicy, SourceFallbackResolver,
        StockClient,
    };

    use super::*;

    struct Exchange;

    #[async_trait]
    impl PrimaryFeed for Exchange {
        async fn ticker_24h(&self, pair: &str) -> Result<PrimaryTicker, PriceError> {
            match pair {
                "BTCUSDT" => Ok(PrimaryTicker {
                    last_price: 67123.4,
                    change_percent: Some(1.5),
                    as_of: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                }),
                _ => Err(PriceError::UpstreamNotFound("Invalid symbol.".into())),
            }
        }
    }

    struct Aggregator;

    #[async_trait]
    impl SecondaryFeed for Aggregator {
        async fn simple_price(&self, id: &str) -> Result<Option<SecondaryPrice>, PriceError> {
            Ok((id == "avant").then_some(SecondaryPrice {
                usd: 0.9123,
                change_24h: Some(-3.21),
                as_of: None,
            }))
        }
    }

    #[async_trait]
    impl DirectorySource for Aggregator {
        async fn load_directory(&self) -> Result<Vec<DirectoryEntry>, PriceError> {
            Ok(vec![DirectoryEntry {
                id: "avant".into(),
                symbol: "avnt".into(),
            }])
        }
    }

    fn data(watchlist: &[&str]) -> Data {
        let retry = RetryPolicy::new(1, std::time::Duration::ZERO);
        let identifiers = Arc::new(IdentifierCache::new(Arc::new(Aggregator)));

        Data {
            resolver: Arc::new(SourceFallbackResolver::new(
                Arc::new(Exchange),
                Arc::new(Aggregator),
                identifiers,
                retry,
            )),
            gold: Arc::new(GoldClient::new(retry).unwrap()),
            stock: Arc::new(StockClient::new(retry).unwrap()),
            watchlist: watchlist.iter().filter_map(|s| Ticker::new(s)).collect(),
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
            version: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_coin_lists_every_symbol_in_order() {
        let text = coin(&data(&["BTC", "AVNT", "NOPE"])).await;

        assert_eq!(
            text,
            "COIN PRICES\n\n\
             BTC: 67,123.40000 USDT (+1.50%)\n\
             AVNT: 0.91230 USD (-3.21%) [Secondary]\n\
             Could not find symbol NOPE."
        );
    }

    #[tokio::test]
    async fn test_coin_with_empty_watchlist() {
        assert_eq!(coin(&data(&[])).await, "No coins are on the watchlist.");
    }

    #[tokio::test]
    async fn test_price_needs_a_symbol() {
        let d = data(&[]);

        assert_eq!(price(&d, None).await, "Usage: /price BTC");

        let avnt = Ticker::new("avnt").unwrap();
        assert_eq!(
            price(&d, Some(&avnt)).await,
            "AVNT: 0.91230 USD (-3.21%) [Secondary]"
        );
    }
}
