//! Dealwatch API server binary

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dealwatch_api::app::{build_router, AppState};
use dealwatch_shared::config::Config;
use dealwatch_shared::fetch::HttpPriceFetcher;
use dealwatch_shared::store::{MemStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let fetcher = Arc::new(HttpPriceFetcher::new(config.poll.fetch_timeout())?);
    let state = AppState::new(store, fetcher);
    let app = build_router(state);

    let address = config.bind_address();
    tracing::info!(address = %address, "Starting dealwatch API server");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
