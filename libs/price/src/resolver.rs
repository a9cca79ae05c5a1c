//! Ticker -> quote resolution across an ordered list of feeds.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::source::{BinanceClient, PrimaryFeed, SecondaryFeed};
use crate::{IdentifierCache, PriceError, PriceQuote, RetryPolicy, Source, Ticker};

/// Outcome of asking one feed.
#[derive(Debug)]
pub enum Attempt {
    Found(PriceQuote),
    /// This feed cannot answer; ask the next one.
    NotFoundTryNext,
    /// Stop here.
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    UnknownSymbol,
    AllSourcesExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnknownSymbol => f.write_str("unknown symbol"),
            FailureReason::AllSourcesExhausted => f.write_str("all sources exhausted"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{ticker}: {reason}")]
pub struct ResolutionFailure {
    pub ticker: Ticker,
    pub reason: FailureReason,
}

impl ResolutionFailure {
    /// One sentence suitable for a chat reply.
    pub fn user_message(&self) -> String {
        match self.reason {
            FailureReason::UnknownSymbol => format!("Could not find symbol {}.", self.ticker),
            FailureReason::AllSourcesExhausted => {
                format!("Could not fetch a price for {} right now.", self.ticker)
            }
        }
    }
}

/// One feed in the fallback chain.
#[async_trait]
pub trait QuoteStrategy: Send + Sync {
    fn source(&self) -> Source;

    async fn attempt(&self, ticker: &Ticker) -> Attempt;
}

/// Exchange feed queried directly by `<TICKER>USDT`.
pub struct PrimaryStrategy {
    feed: Arc<dyn PrimaryFeed>,
    retry: RetryPolicy,
}

impl PrimaryStrategy {
    pub fn new(feed: Arc<dyn PrimaryFeed>, retry: RetryPolicy) -> Self {
        Self { feed, retry }
    }
}

#[async_trait]
impl QuoteStrategy for PrimaryStrategy {
    fn source(&self) -> Source {
        Source::Primary
    }

    async fn attempt(&self, ticker: &Ticker) -> Attempt {
        let pair = BinanceClient::pair(ticker);
        let symbol = pair.as_str();

        match self
            .retry
            .execute("primary ticker", move || self.feed.ticker_24h(symbol))
            .await
        {
            Ok(t) => Attempt::Found(PriceQuote {
                symbol: ticker.clone(),
                price: t.last_price,
                change_percent_24h: t.change_percent,
                source: Source::Primary,
                as_of: t.as_of,
            }),
            Err(PriceError::UpstreamNotFound(msg)) => {
                debug!(%pair, %msg, "pair not listed on primary");
                Attempt::NotFoundTryNext
            }
            Err(e) => {
                warn!(%pair, error = %e, "primary feed failed, falling through");
                Attempt::NotFoundTryNext
            }
        }
    }
}

/// Aggregator feed, reached through the identifier cache.
pub struct SecondaryStrategy {
    feed: Arc<dyn SecondaryFeed>,
    identifiers: Arc<IdentifierCache>,
    retry: RetryPolicy,
}

impl SecondaryStrategy {
    pub fn new(
        feed: Arc<dyn SecondaryFeed>,
        identifiers: Arc<IdentifierCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            feed,
            identifiers,
            retry,
        }
    }
}

#[async_trait]
impl QuoteStrategy for SecondaryStrategy {
    fn source(&self) -> Source {
        Source::Secondary
    }

    async fn attempt(&self, ticker: &Ticker) -> Attempt {
        let Some(id) = self.identifiers.resolve(ticker).await else {
            debug!(symbol = %ticker, "no secondary identifier");
            return Attempt::Failed(FailureReason::UnknownSymbol);
        };

        let key = id.as_str();

        match self
            .retry
            .execute("secondary price", move || self.feed.simple_price(key))
            .await
        {
            Ok(Some(p)) => Attempt::Found(PriceQuote {
                symbol: ticker.clone(),
                price: p.usd,
                change_percent_24h: p.change_24h,
                source: Source::Secondary,
                as_of: p.as_of.unwrap_or_else(Utc::now),
            }),
            Ok(None) => {
                debug!(symbol = %ticker, %id, "identifier missing from secondary response");
                Attempt::NotFoundTryNext
            }
            Err(e) => {
                warn!(symbol = %ticker, %id, error = %e, "secondary feed failed");
                Attempt::Failed(FailureReason::AllSourcesExhausted)
            }
        }
    }
}

/// Tries each strategy in order and stops at the first that answers.
pub struct SourceFallbackResolver {
    strategies: Vec<Box<dyn QuoteStrategy>>,
}

impl SourceFallbackResolver {
    /// Primary first, then Secondary.
    pub fn new(
        primary: Arc<dyn PrimaryFeed>,
        secondary: Arc<dyn SecondaryFeed>,
        identifiers: Arc<IdentifierCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self::with_strategies(vec![
            Box::new(PrimaryStrategy::new(primary, retry)),
            Box::new(SecondaryStrategy::new(secondary, identifiers, retry)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn QuoteStrategy>>) -> Self {
        Self { strategies }
    }

    #[instrument(name = "quote", skip_all, fields(symbol = %ticker))]
    pub async fn quote(&self, ticker: &Ticker) -> Result<PriceQuote, ResolutionFailure> {
        for strategy in &self.strategies {
            match strategy.attempt(ticker).await {
                Attempt::Found(quote) => {
                    info!(source = strategy.source().as_str(), price = quote.price, "resolved");
                    return Ok(quote);
                }
                Attempt::NotFoundTryNext => continue,
                Attempt::Failed(reason) => {
                    info!(source = strategy.source().as_str(), %reason, "resolution failed");
                    return Err(ResolutionFailure {
                        ticker: ticker.clone(),
                        reason,
                    });
                }
            }
        }

        Err(ResolutionFailure {
            ticker: ticker.clone(),
            reason: FailureReason::AllSourcesExhausted,
        })
    }

    /// Quote every ticker in order, one at a time.
    pub async fn quote_all(
        &self,
        tickers: &[Ticker],
    ) -> Vec<Result<PriceQuote, ResolutionFailure>> {
        let mut out = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            out.push(self.quote(ticker).await);
        }
        out
    }
}
