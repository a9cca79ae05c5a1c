use std::env::var;

use anyhow::{Context, Result, anyhow, bail};
use chrono_tz::Tz;
use price::Ticker;

use crate::bridge::Recipient;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_NOTIFY_TIMES: &str = "08:00,15:00,20:00";
const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
const DEFAULT_WATCHLIST: &str = "BTC,ETH,SOMI,AVNT,ASTER,TREE";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub chat_id: Recipient,
    pub public_url: Option<String>,
    pub port: u16,
    pub notify_times: Vec<(u32, u32)>,
    pub timezone: Tz,
    pub watchlist: Vec<Ticker>,
    pub version: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN").context("BOT_TOKEN not set")?;
        let chat_id: Recipient = get("CHAT_ID")
            .context("CHAT_ID not set")?
            .trim()
            .parse()
            .context("CHAT_ID must be an integer")?;
        let port: u16 = match get("PORT") {
            Some(p) => p.trim().parse().context("PORT must be a port number")?,
            None => DEFAULT_PORT,
        };
        let notify_times =
            parse_times(get("NOTIFY_TIMES").as_deref().unwrap_or(DEFAULT_NOTIFY_TIMES))?;
        let timezone = get("TIMEZONE")
            .as_deref()
            .unwrap_or(DEFAULT_TIMEZONE)
            .trim()
            .parse::<Tz>()
            .map_err(|e| anyhow!("TIMEZONE: {e}"))?;
        let watchlist = get("COIN_WATCHLIST")
            .as_deref()
            .unwrap_or(DEFAULT_WATCHLIST)
            .split(',')
            .filter_map(Ticker::new)
            .collect();

        Ok(Self {
            bot_token,
            chat_id,
            public_url: get("PUBLIC_URL").map(|u| u.trim().trim_end_matches('/').to_string()),
            port,
            notify_times,
            timezone,
            watchlist,
            version: get("APP_VERSION").unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

/// Comma-separated `HH:MM` list.
fn parse_times(raw: &str) -> Result<Vec<(u32, u32)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let (h, m) = s
                .split_once(':')
                .with_context(|| format!("notify time {s:?} is not HH:MM"))?;
            let hour: u32 = h.parse().with_context(|| format!("bad hour in {s:?}"))?;
            let minute: u32 = m.parse().with_context(|| format!("bad minute in {s:?}"))?;
            if hour >= 24 || minute >= 60 {
                bail!("notify time {s:?} is out of range");
            }
            Ok((hour, minute))
        })
        .collect()
}
