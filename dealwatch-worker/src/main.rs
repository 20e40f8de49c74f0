//! Dealwatch worker binary
//!
//! Runs the price poller and alert dispatcher until Ctrl-C.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dealwatch_shared::config::Config;
use dealwatch_shared::fetch::HttpPriceFetcher;
use dealwatch_shared::outbound::LogMessenger;
use dealwatch_shared::store::{MemStore, Store};
use dealwatch_worker::dispatcher::AlertDispatcher;
use dealwatch_worker::poller::PricePoller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        interval_hours = config.poll.interval_hours,
        threshold = %format!("{:.0}%", config.alerts.min_drop_pct * 100.0),
        cooldown_hours = config.alerts.cooldown_hours,
        "Starting dealwatch worker"
    );

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let fetcher = Arc::new(HttpPriceFetcher::new(config.poll.fetch_timeout())?);
    let messenger = Arc::new(LogMessenger);
    let dispatcher = Arc::new(AlertDispatcher::new(
        store.clone(),
        messenger,
        config.alerts.clone(),
    ));
    let poller = PricePoller::new(store, fetcher, dispatcher, config.poll.clone());

    let shutdown = CancellationToken::new();
    let signal = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        })
    };

    poller.run(shutdown).await;
    signal.abort();
    Ok(())
}
