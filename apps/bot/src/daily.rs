use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, instrument};

use crate::Data;

#[instrument(name = "run_daily", skip_all, fields(timezone = %data.timezone))]
pub async fn run_daily(data: &Data) -> String {
    let now = Utc::now().with_timezone(&data.timezone);
    let board = data.gold.report().await;

    info!(chars = board.len(), "daily gold report rendered");
    format!("{}\n\n{}", header(&now), board)
}

pub fn header<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("Gold price update {}", now.format("%d/%m/%Y %H:%M"))
}
