//! marketfeed - Market Data Normalization Feed
//!
//! Connects to an exchange WebSocket feed, subscribes to the configured
//! trading pairs, and logs the normalized event stream.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use marketfeed::registry::normalize_pair;
use marketfeed::{
    Config, Dispatcher, ExchangeAdapter, FeedRunner, KrakenAdapter, Market, Publisher,
    SubscriptionController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting marketfeed");

    let config = Config::load()?;
    info!(pairs = ?config.pairs, endpoint = %config.ws_endpoint, "configuration loaded");

    let markets = config
        .pairs
        .iter()
        .map(|pair| {
            let canonical = normalize_pair(pair);
            let (base, quote) = canonical
                .split_once('/')
                .with_context(|| format!("pair {pair} is not BASE/QUOTE"))?;
            Ok(Market::new(base, quote, pair))
        })
        .collect::<anyhow::Result<Vec<Market>>>()?;

    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(KrakenAdapter::new(config.book_depth));
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let controller = Arc::new(SubscriptionController::new(
        adapter.clone(),
        outbound_tx.clone(),
    ));

    let (publisher, mut events) = Publisher::new().with_channel();

    // Drain the tagged event stream into the log.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(
                kind = event.kind(),
                market = %event.market().pair(),
                "event"
            );
        }
    });

    let dispatcher = Dispatcher::new(adapter, controller.pending(), publisher, outbound_tx);

    let subscribe_all = {
        let controller = controller.clone();
        move || {
            for market in &markets {
                controller.subscribe_trades(market)?;
                controller.subscribe_level2_updates(market)?;
                if let Err(e) = controller.subscribe_ticker(market) {
                    warn!(market = %market.pair(), error = %e, "ticker subscription skipped");
                }
            }
            Ok(())
        }
    };

    let mut runner = FeedRunner::new(
        &config.ws_endpoint,
        config.reconnect_delay_ms,
        dispatcher,
        outbound_rx,
    )
    .on_connect(Box::new(subscribe_all));

    runner.run().await?;

    Ok(())
}
