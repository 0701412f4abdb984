//! Health, status, and metrics handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: String,
    pub commit: String,
    /// Which cache backend is live: `redis` or the process-local `memory`
    /// fallback.
    pub cache_backend: &'static str,
    pub tracked_queries: usize,
    pub origin_fetches_in_flight: usize,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint showing build and cache-layer state
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "active",
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        cache_backend: state.store.backend_name(),
        tracked_queries: state.popularity.tracked(),
        origin_fetches_in_flight: state.origin_flights.in_flight(),
    })
}

/// Counter snapshot for offline analysis
pub(super) async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
