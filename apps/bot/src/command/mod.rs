mod coin;
mod gold;
mod stock;

use async_trait::async_trait;
use price::Ticker;
use tracing::info;

use crate::Data;
use crate::bridge::{Renderer, Request};

pub const HELP: &str = "Commands:\n\
    /gold - gold prices (BTMC)\n\
    /coin - prices for the coin watchlist\n\
    /price <SYMBOL> - one coin, e.g. /price BTC\n\
    /stock <SYMBOL> - one Vietnamese stock, e.g. /stock MBB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Test,
    Gold,
    Coin,
    Price(Option<Ticker>),
    Stock(Option<Ticker>),
}

impl Command {
    /// `/name [arg]`, with an optional `@botname` suffix. Anything else is
    /// `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let arg = parts.next().and_then(Ticker::new);

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "test" => Command::Test,
            "gold" | "gia" | "vang" => Command::Gold,
            "coin" => Command::Coin,
            "price" | "tuchon" => Command::Price(arg),
            "stock" => Command::Stock(arg),
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Test => "test",
            Command::Gold => "gold",
            Command::Coin => "coin",
            Command::Price(_) => "price",
            Command::Stock(_) => "stock",
        }
    }
}

pub async fn run(data: &Data, command: &Command) -> String {
    info!(command = command.name(), "running command");

    match command {
        Command::Start => format!("Bot is ready! ({})\n\n{HELP}", data.version),
        Command::Help => HELP.to_string(),
        Command::Test => "OK!".to_string(),
        Command::Gold => gold::gold(data).await,
        Command::Coin => coin::coin(data).await,
        Command::Price(ticker) => coin::price(data, ticker.as_ref()).await,
        Command::Stock(ticker) => stock::stock(data, ticker.as_ref()).await,
    }
}

#[async_trait]
impl Renderer for Data {
    async fn render(&self, request: &Request) -> String {
        match request {
            Request::Command(command) => run(self, command).await,
            Request::ScheduledGold => crate::daily::run_daily(self).await,
        }
    }
}
