use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use scraper::{Html, Selector};
use tracing::{info, instrument};

use crate::gold::UNAVAILABLE;
use crate::{PriceError, RetryPolicy, Ticker};

const BASE_URL: &str = "https://simplize.vn/co-phieu";
const TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_UA: &str = "Mozilla/5.0";

static HEADLINE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.simplize-row.simplize-row-middle").expect("static selector")
});
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.css-19r22fg").expect("static selector"));
static CHANGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.css-1ei6h64").expect("static selector"));

/// Listed equity price as shown on the quote page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockQuote {
    pub symbol: Ticker,
    pub price: Option<String>,
    pub change: Option<String>,
}

impl fmt::Display for StockQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.symbol,
            self.price.as_deref().unwrap_or(UNAVAILABLE),
            self.change.as_deref().unwrap_or(UNAVAILABLE)
        )
    }
}

/// `None` when the page has no quote headline (unknown symbol).
pub fn extract_stock(symbol: &Ticker, markup: &str) -> Option<StockQuote> {
    let doc = Html::parse_document(markup);
    let headline = doc.select(&HEADLINE).next()?;

    let text_of = |sel: &Selector| {
        headline
            .select(sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Some(StockQuote {
        symbol: symbol.clone(),
        price: text_of(&*PRICE),
        change: text_of(&*CHANGE),
    })
}

#[derive(Clone)]
pub struct StockClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl StockClient {
    pub fn new(retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        Self::with_base_url(BASE_URL, retry)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            retry,
        })
    }

    #[instrument(name = "stock_quote", skip_all, fields(symbol = %symbol))]
    pub async fn quote(&self, symbol: &Ticker) -> Result<Option<StockQuote>, PriceError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), symbol);
        let url = url.as_str();

        let markup = self
            .retry
            .execute("stock page", move || async move {
                let res = self.client.get(url).send().await?;
                let status = res.status();
                if !status.is_success() {
                    return Err(PriceError::from_status(status, ""));
                }
                Ok(res.text().await?)
            })
            .await?;

        let quote = extract_stock(symbol, &markup);
        info!(found = quote.is_some(), "stock page parsed");
        Ok(quote)
    }
}
