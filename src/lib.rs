//! tankwatch-hub library - sensor reading ingestion and bounded history
//!
//! The hub accepts readings from a water-tank monitor in two payload
//! vocabularies, normalizes and validates them, keeps the newest N in a
//! single durable CSV blob, and serves the whole log back to dashboards.

use std::sync::Arc;

use axum::Router;

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod storage;

use history::HistoryLog;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The durable reading log (sole owner of the storage blob)
    pub history: Arc<HistoryLog>,
}

impl AppState {
    /// Create new application state
    pub fn new(history: HistoryLog) -> Self {
        Self {
            history: Arc::new(history),
        }
    }
}

/// Build application router
///
/// One route, dispatched by method; everything else on the method router
/// falls through to the 405 handler. The CORS layer wraps the lot.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route(
            "/",
            get(api::get_history)
                .post(api::ingest_reading)
                .options(api::preflight)
                .fallback(api::method_not_allowed),
        )
        .layer(api::cors_layer())
        .with_state(state)
}
