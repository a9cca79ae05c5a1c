//! BTMC gold price board.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{PriceError, RetryPolicy};

const GOLD_URL: &str = "https://btmc.vn";
const TIMEOUT: Duration = Duration::from_secs(15);
const BROWSER_UA: &str = "Mozilla/5.0";

/// Marker for a price cell with no usable value.
pub const UNAVAILABLE: &str = "N/A";

pub const REPORT_TITLE: &str = "GOLD PRICES (BTMC)";

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.bd_price_home").expect("static selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));
static NOTE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.note").expect("static selector"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldPriceRow {
    pub product_name: String,
    pub fineness: Option<String>,
    pub buy_price: String,
    pub sell_price: String,
}

impl fmt::Display for GoldPriceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fineness {
            Some(fineness) => write!(f, "{} ({})", self.product_name, fineness)?,
            None => f.write_str(&self.product_name)?,
        }
        write!(f, "\nBuy: {} | Sell: {}", self.buy_price, self.sell_price)
    }
}

#[derive(Error, Debug)]
pub enum ExtractionFailure {
    #[error("gold price table not found")]
    TableNotFound,

    #[error("gold price page unavailable: {0}")]
    Fetch(#[from] PriceError),
}

impl ExtractionFailure {
    /// Apology shown instead of the board.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExtractionFailure::TableNotFound => {
                "Sorry, the gold price board is unavailable right now. Please try again later."
            }
            ExtractionFailure::Fetch(_) => {
                "Sorry, the gold price site could not be reached. Please try again later."
            }
        }
    }
}

/// Parse the pricing table into rows, in table order.
///
/// Buy and sell are the last two cells of a row and fineness the one before
/// them; the product is the cell before the fineness. A first cell with
/// `rowspan=N` opens a block whose next `N - 1` rows omit that cell; rows
/// that carry no product of their own, like those starting with an empty
/// cell, keep the last product.
pub fn extract(markup: &str) -> Result<Vec<GoldPriceRow>, ExtractionFailure> {
    let doc = Html::parse_document(markup);
    let table = doc
        .select(&TABLE)
        .next()
        .ok_or(ExtractionFailure::TableNotFound)?;

    let mut rows = Vec::new();
    let mut carried: Option<String> = None;
    let mut span_left = 0usize;

    // header row first
    for tr in table.select(&ROW).skip(1) {
        let cells: Vec<ElementRef> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td")
            .collect();

        if cells.is_empty() {
            continue;
        }

        let (continuation, rest) = if span_left > 0 {
            span_left -= 1;
            (true, &cells[..])
        } else if cell_text(&cells[0]).is_empty() && carried.is_some() {
            (true, &cells[1..])
        } else {
            span_left = rowspan(&cells[0]).saturating_sub(1);
            (false, &cells[..])
        };

        let texts: Vec<String> = rest.iter().map(cell_text).collect();
        if texts.len() < 2 {
            debug!(cells = texts.len(), "skipping short row");
            continue;
        }

        // buy and sell are always the last two cells
        let (lead, prices) = texts.split_at(texts.len() - 2);
        let (names, fineness) = match (continuation, lead) {
            (_, []) => (lead, None),
            (false, [_]) => (lead, None),
            (true, [fineness]) => (&lead[..0], Some(fineness)),
            (_, [names @ .., fineness]) => (names, Some(fineness)),
        };

        let name = names
            .last()
            .filter(|n| !n.is_empty())
            .cloned()
            .or_else(|| carried.clone());
        let Some(product_name) = name else {
            continue;
        };
        if !continuation {
            carried = Some(product_name.clone());
        }

        rows.push(GoldPriceRow {
            product_name,
            fineness: fineness.filter(|f| !f.is_empty()).cloned(),
            buy_price: normalize_price(&prices[0]),
            sell_price: normalize_price(&prices[1]),
        });
    }

    Ok(rows)
}

/// The "last updated" line under the board, without the source credit.
pub fn extract_update_note(markup: &str) -> Option<String> {
    let doc = Html::parse_document(markup);
    let note = doc.select(&NOTE).next()?;

    let text = note
        .text()
        .collect::<String>()
        .replace("Nguồn: www.btmc.vn", "");
    let text = collapse_whitespace(&text);

    if text.is_empty() { None } else { Some(text) }
}

pub fn render_rows(rows: &[GoldPriceRow]) -> String {
    rows.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_report(note: Option<&str>, rows: &[GoldPriceRow]) -> String {
    let mut out = String::from(REPORT_TITLE);
    if let Some(note) = note {
        out.push('\n');
        out.push_str(note);
    }
    out.push_str("\n\n");
    if rows.is_empty() {
        out.push_str("No prices are listed at the moment.");
    } else {
        out.push_str(&render_rows(rows));
    }
    out
}

fn cell_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn rowspan(el: &ElementRef) -> usize {
    el.value()
        .attr("rowspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
}

fn normalize_price(raw: &str) -> String {
    let text = raw.trim();
    let lower = text.to_lowercase();

    if text.is_empty()
        || matches!(text, "-" | "–" | "—")
        || lower.contains("contact us")
        || lower.contains("liên hệ")
    {
        UNAVAILABLE.to_string()
    } else {
        text.to_string()
    }
}

/// Fetches the board page.
#[derive(Clone)]
pub struct GoldClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl GoldClient {
    pub fn new(retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        Self::with_url(GOLD_URL, retry)
    }

    pub fn with_url(url: impl Into<String>, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            retry,
        })
    }

    pub async fn fetch_page(&self) -> Result<String, PriceError> {
        self.retry
            .execute("gold page", move || async move {
                let res = self.client.get(&self.url).send().await?;
                let status = res.status();
                if !status.is_success() {
                    return Err(PriceError::from_status(status, ""));
                }
                Ok(res.text().await?)
            })
            .await
    }

    /// Full board text, or an apology.
    #[instrument(name = "gold_report", skip_all)]
    pub async fn report(&self) -> String {
        let markup = match self.fetch_page().await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(error = %e, "gold page fetch failed");
                return ExtractionFailure::from(e).user_message().to_string();
            }
        };

        match extract(&markup) {
            Ok(rows) => {
                info!(rows = rows.len(), "gold board extracted");
                let note = extract_update_note(&markup);
                render_report(note.as_deref(), &rows)
            }
            Err(e) => {
                warn!(error = %e, "gold board extraction failed");
                e.user_message().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"
        <html><body>
        <table class="bd_price_home">
          <tr><th>Product</th><th>Fineness</th><th>Buy</th><th>Sell</th></tr>
          <tr>
            <td rowspan="3">Vàng miếng SJC</td>
            <td>999.9</td><td><b>11.850</b></td><td><b>12.050</b></td>
          </tr>
          <tr><td>99.9</td><td>11.700</td><td>11.950</td></tr>
          <tr><td>99.0</td><td>Contact us</td><td>-</td></tr>
          <tr>
            <td>Nhẫn tròn   trơn</td>
            <td>24K</td><td>11.500</td><td>11.800</td>
          </tr>
          <tr><td></td><td>18K</td><td></td><td>8.900</td></tr>
        </table>
        <p class="note">Cập nhật lúc 08:15 19/10/2026 Nguồn: www.btmc.vn</p>
        </body></html>
    "#;

    #[test]
    fn test_rowspan_block_shares_product_name() {
        let rows = extract(BOARD).unwrap();

        assert_eq!(rows.len(), 5);
        for row in &rows[..3] {
            assert_eq!(row.product_name, "Vàng miếng SJC");
        }
        assert_eq!(rows[0].fineness.as_deref(), Some("999.9"));
        assert_eq!(rows[0].buy_price, "11.850");
        assert_eq!(rows[1].fineness.as_deref(), Some("99.9"));
        assert_eq!(rows[2].fineness.as_deref(), Some("99.0"));
    }

    #[test]
    fn test_placeholders_become_unavailable() {
        let rows = extract(BOARD).unwrap();

        assert_eq!(rows[2].buy_price, UNAVAILABLE);
        assert_eq!(rows[2].sell_price, UNAVAILABLE);
        assert_eq!(rows[4].buy_price, UNAVAILABLE);
        assert_eq!(rows[4].sell_price, "8.900");
    }

    #[test]
    fn test_empty_first_cell_continues_product() {
        let rows = extract(BOARD).unwrap();

        assert_eq!(rows[3].product_name, "Nhẫn tròn trơn");
        assert_eq!(rows[4].product_name, "Nhẫn tròn trơn");
        assert_eq!(rows[4].fineness.as_deref(), Some("18K"));
    }

    #[test]
    fn test_missing_table() {
        let err = extract("<html><body><h1>Maintenance</h1></body></html>").unwrap_err();

        assert!(matches!(err, ExtractionFailure::TableNotFound));
        assert!(!err.user_message().is_empty());
        assert!(err.user_message().starts_with("Sorry"));
    }

    #[test]
    fn test_row_without_fineness() {
        let markup = r#"<table class="bd_price_home">
            <tr><th>h</th></tr>
            <tr><td>Bạc</td><td>1.200</td><td>1.300</td></tr>
        </table>"#;
        let rows = extract(markup).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fineness, None);
        assert_eq!(rows[0].to_string(), "Bạc\nBuy: 1.200 | Sell: 1.300");
    }

    const BRANDED_BOARD: &str = r#"
        <table class="bd_price_home">
          <tr><th>Brand</th><th>Product</th><th>Fineness</th><th>Buy</th><th>Sell</th></tr>
          <tr>
            <td rowspan="3"><img alt="BTMC"/>BTMC</td>
            <td>Vàng miếng SJC</td><td>999.9</td><td><b>11.850</b></td><td><b>12.050</b></td>
          </tr>
          <tr>
            <td>Nhẫn tròn trơn</td><td>999.9</td><td><b>11.500</b></td><td><b>11.800</b></td>
          </tr>
          <tr><td>Trang sức</td><td>99.9</td><td>-</td><td><b>11.600</b></td></tr>
          <tr>
            <td>BTMC</td><td>Vàng Rồng Thăng Long</td><td>999.9</td>
            <td>11.700</td><td>12.000</td>
          </tr>
        </table>"#;

    #[test]
    fn test_brand_column_layout() {
        let rows = extract(BRANDED_BOARD).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0],
            GoldPriceRow {
                product_name: "Vàng miếng SJC".into(),
                fineness: Some("999.9".into()),
                buy_price: "11.850".into(),
                sell_price: "12.050".into(),
            }
        );
        assert_eq!(rows[1].product_name, "Nhẫn tròn trơn");
        assert_eq!(rows[1].buy_price, "11.500");
        assert_eq!(rows[1].sell_price, "11.800");
        assert_eq!(rows[2].product_name, "Trang sức");
        assert_eq!(rows[2].fineness.as_deref(), Some("99.9"));
        assert_eq!(rows[2].buy_price, UNAVAILABLE);
        assert_eq!(rows[2].sell_price, "11.600");
        assert_eq!(rows[3].product_name, "Vàng Rồng Thăng Long");
        assert_eq!(rows[3].sell_price, "12.000");
    }

    #[test]
    fn test_update_note_strips_source() {
        assert_eq!(
            extract_update_note(BOARD).as_deref(),
            Some("Cập nhật lúc 08:15 19/10/2026")
        );
        assert_eq!(extract_update_note("<p>nothing</p>"), None);
    }

    #[test]
    fn test_render_report() {
        let rows = extract(BOARD).unwrap();
        let text = render_report(Some("Updated 08:15"), &rows[..2]);

        assert_eq!(
            text,
            "GOLD PRICES (BTMC)\nUpdated 08:15\n\n\
             Vàng miếng SJC (999.9)\nBuy: 11.850 | Sell: 12.050\n\n\
             Vàng miếng SJC (99.9)\nBuy: 11.700 | Sell: 11.950"
        );
    }

    mod client {
        use std::time::Duration;

        use axum::http::StatusCode;

        use super::BOARD;
        use crate::gold::{ExtractionFailure, GoldClient};
        use crate::test_server::{hits, page};
        use crate::{PriceError, RetryPolicy};

        const FETCH_APOLOGY: &str =
            "Sorry, the gold price site could not be reached. Please try again later.";

        fn client(url: &str) -> GoldClient {
            GoldClient::with_url(url, RetryPolicy::new(2, Duration::from_millis(20))).unwrap()
        }

        #[tokio::test]
        async fn test_report_renders_board() {
            let (url, counter) = page(StatusCode::OK, BOARD).await;

            let text = client(&url).report().await;

            assert!(text.starts_with("GOLD PRICES (BTMC)\nCập nhật lúc 08:15 19/10/2026\n\n"));
            assert!(text.contains("Vàng miếng SJC (999.9)\nBuy: 11.850 | Sell: 12.050"));
            assert_eq!(hits(&counter), 1);
        }

        #[tokio::test]
        async fn test_unavailable_site_is_retried_then_apologizes() {
            let (url, counter) = page(StatusCode::SERVICE_UNAVAILABLE, "down").await;

            let text = client(&url).report().await;

            assert_eq!(text, FETCH_APOLOGY);
            assert_eq!(hits(&counter), 2);
        }

        #[tokio::test]
        async fn test_missing_page_is_not_retried() {
            let (url, counter) = page(StatusCode::NOT_FOUND, "gone").await;

            let err = client(&url).fetch_page().await.unwrap_err();
            assert!(matches!(err, PriceError::UpstreamNotFound(_)));
            assert_eq!(client(&url).report().await, FETCH_APOLOGY);
            assert_eq!(hits(&counter), 2);
        }

        #[tokio::test]
        async fn test_page_without_table_apologizes() {
            let (url, _) = page(StatusCode::OK, "<html><body>maintenance</body></html>").await;

            assert_eq!(
                client(&url).report().await,
                ExtractionFailure::TableNotFound.user_message()
            );
        }
    }

    #[test]
    fn test_render_report_without_rows() {
        let text = render_report(None, &[]);
        assert_eq!(text, "GOLD PRICES (BTMC)\n\nNo prices are listed at the moment.");
    }
}
