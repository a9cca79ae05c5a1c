use price::Ticker;
use tracing::warn;

use crate::Data;

pub async fn stock(data: &Data, ticker: Option<&Ticker>) -> String {
    let Some(ticker) = ticker else {
        return "Usage: /stock MBB".to_string();
    };

    match data.stock.quote(ticker).await {
        Ok(Some(quote)) => quote.to_string(),
        Ok(None) => format!("Could not find stock {ticker}."),
        Err(e) => {
            warn!(symbol = %ticker, error = %e, "stock quote failed");
            format!("Could not fetch a price for {ticker} right now.")
        }
    }
}
