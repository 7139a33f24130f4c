//! ==============================================================================
//! main.rs - tankwatch hub entry point
//! ==============================================================================
//!
//! purpose:
//!     this is the ingestion hub for a remote water-tank monitor. the
//!     device POSTs a reading every polling cycle; dashboards GET the
//!     retained history back for charts and status cards.
//!
//! responsibilities:
//!     - initialize logging and load hub.toml (+ env overrides)
//!     - wire the configured blob-store backend into the reading log
//!     - serve the HTTP surface (OPTIONS/GET/POST on the root path)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────┐
//!     │                  hub (this binary)                   │
//!     │   ┌───────────┐   ┌────────────┐   ┌─────────────┐   │
//!     │   │ normalize │ → │  validate  │ → │ reading log │   │
//!     │   └─────▲─────┘   └────────────┘   └──────┬──────┘   │
//!     │         │ POST /                  GET /   │          │
//!     └─────────┼────────────────────────▲────────┼──────────┘
//!               │                        │        │ whole-blob RMW
//!        ┌──────┴──────┐          ┌──────┴───┐ ┌──▼──────────────┐
//!        │ tank sensor │          │ dashboard│ │ storage bucket  │
//!        │  (device)   │          │ (browser)│ │ (one CSV blob)  │
//!        └─────────────┘          └──────────┘ └─────────────────┘
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use tankwatch_hub::config::{HubConfig, StorageBackend};
use tankwatch_hub::history::HistoryLog;
use tankwatch_hub::storage::{MemoryStore, ObjectStore, SupabaseStore};
use tankwatch_hub::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting tankwatch-hub v{}", env!("CARGO_PKG_VERSION"));

    let config = HubConfig::load_or_default();
    config.log_summary();

    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::Supabase => {
            if config.storage.project_url.is_empty() || config.storage.service_key.is_empty() {
                anyhow::bail!(
                    "supabase backend needs storage.project_url and a service key \
                     (set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY, or use backend = \"memory\")"
                );
            }
            Arc::new(SupabaseStore::new(
                &config.storage.project_url,
                &config.storage.bucket,
                &config.storage.service_key,
            ))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage - readings are lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let history = HistoryLog::new(
        store,
        config.storage.object_key.clone(),
        config.retention.max_entries,
    );
    let app = build_router(AppState::new(history));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!("tankwatch-hub listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
