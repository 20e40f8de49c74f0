/// Application state and router assembly
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use dealwatch_shared::directory::RoomDirectory;
use dealwatch_shared::fetch::PriceFetcher;
use dealwatch_shared::registry::WatchRegistry;
use dealwatch_shared::router::CommandRouter;
use dealwatch_shared::store::Store;
use dealwatch_shared::summary::SummaryGenerator;

use crate::routes;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Chat command router
    pub router: Arc<CommandRouter>,

    /// Order summary generator, for the read endpoint
    pub summary: Arc<SummaryGenerator>,
}

impl AppState {
    /// Wires the domain services over a store and a price source
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn PriceFetcher>) -> Self {
        let directory = Arc::new(RoomDirectory::new(store.clone()));
        let registry = Arc::new(WatchRegistry::new(store.clone(), fetcher));
        let summary = Arc::new(SummaryGenerator::new(store));
        let router = Arc::new(CommandRouter::new(directory, registry, summary.clone()));
        AppState { router, summary }
    }
}

/// Builds the HTTP router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/v1/inbound", post(routes::inbound::inbound_message))
        .route(
            "/v1/rooms/:room_id/summary",
            get(routes::summary::room_summary),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
