use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use bot::{
    Data,
    bridge::Bridge,
    config::Config,
    delivery::{TelegramDelivery, register_webhook},
    schedule, webhook,
};
use price::{
    GoldClient, IdentifierCache, RetryPolicy, SourceFallbackResolver, StockClient,
    source::{BinanceClient, CoinGeckoClient},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let retry = RetryPolicy::default();

    let coingecko = Arc::new(CoinGeckoClient::new().context("init coingecko client failed")?);
    let identifiers = Arc::new(IdentifierCache::new(coingecko.clone()));
    let resolver = SourceFallbackResolver::new(
        Arc::new(BinanceClient::new().context("init binance client failed")?),
        coingecko,
        identifiers.clone(),
        retry,
    );

    let data = Arc::new(Data {
        resolver: Arc::new(resolver),
        gold: Arc::new(GoldClient::new(retry).context("init gold client failed")?),
        stock: Arc::new(StockClient::new(retry).context("init stock client failed")?),
        watchlist: config.watchlist.clone(),
        timezone: config.timezone,
        version: config.version.clone(),
    });

    let known = identifiers.warm().await;
    info!(known, "coin identifiers loaded");

    match &config.public_url {
        Some(url) => register_webhook(url, &config.bot_token).await?,
        None => warn!("PUBLIC_URL not set, webhook registration skipped"),
    }

    let bridge = Bridge::new();
    bridge.start(data, Arc::new(TelegramDelivery::new(&config.bot_token)))?;

    let jobs = schedule::daily_jobs(config.chat_id, &config.notify_times, config.timezone);
    let mut sched = schedule::start(&jobs, bridge.clone()).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = %config.version, "bot listening");

    axum::serve(listener, webhook::router(bridge.clone(), &config.bot_token))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = sched.shutdown().await {
        error!(error = %e, "scheduler shutdown failed");
    }
    let draining = bridge.clone();
    tokio::task::spawn_blocking(move || draining.shutdown()).await?;

    let stats = bridge.stats();
    info!(
        submitted = stats.submitted,
        delivered = stats.delivered,
        failed = stats.failed,
        "Shutdown complete."
    );
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
