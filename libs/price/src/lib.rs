mod error;
mod identifier_cache;
mod quote;
mod resolver;
mod retry;
#[cfg(test)]
mod test_server;

pub mod gold;
pub mod source;
pub mod stock;

pub use error::PriceError;
pub use gold::{ExtractionFailure, GoldClient, GoldPriceRow};
pub use identifier_cache::IdentifierCache;
pub use quote::{PriceQuote, Source, Ticker};
pub use resolver::{
    Attempt, FailureReason, PrimaryStrategy, QuoteStrategy, ResolutionFailure,
    SecondaryStrategy, SourceFallbackResolver,
};
pub use retry::RetryPolicy;
pub use stock::{StockClient, StockQuote};
