//! ==============================================================================
//! api.rs - HTTP Surface
//! ==============================================================================
//!
//! purpose:
//!     method dispatch on the root path and response shaping.
//!     OPTIONS -> empty 200 (CORS preflight), GET -> full reading history
//!     wrapped in {"data": [...]}, POST -> normalize/validate/append one
//!     reading, anything else -> 405 JSON. all responses carry permissive
//!     CORS headers so browser dashboards can call the hub from anywhere.
//!
//! ==============================================================================

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::Json;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::domain::{IncomingPayload, Reading};
use crate::error::ApiError;
use crate::AppState;

/// GET response wrapper the dashboard consumes.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<Reading>,
}

/// POST response: the finalized reading echoed back with a success flag.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(flatten)]
    pub reading: Reading,
}

/// CORS policy: any origin, plus the headers browser dashboards send
/// along (supabase-js attaches authorization/apikey/x-client-info).
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// OPTIONS / - empty body; the CORS layer decorates the response.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// GET / - the full retained history, oldest first.
pub async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let data = state.history.query().await;
    debug!(count = data.len(), "serving reading history");
    Json(HistoryResponse { data })
}

/// POST / - ingest one reading in either payload shape.
///
/// The body is decoded by hand instead of through the `Json` extractor:
/// an unparseable body is an internal catch-all (500), not a rejected
/// reading (400), and the two must stay distinguishable for callers.
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let raw: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::Internal(err.to_string()))?;
    debug!(payload = %raw, "received raw reading");

    let reading = IncomingPayload::detect(&raw).normalize().finalize()?;
    state.history.append(&reading).await?;

    info!(
        water_level = reading.water_level,
        rain = reading.rain_status,
        valve = reading.valve_status,
        "reading stored"
    );
    Ok(Json(IngestResponse {
        success: true,
        reading,
    }))
}

/// Every method other than OPTIONS/GET/POST.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
