//! Prefetch endpoint.
//!
//! `GET /prefetch?query=&collection=&profile=&ttl=` acknowledges with `202`
//! immediately; the fetch-and-cache pipeline runs after the response is
//! sent. A prefetch failure is invisible to the caller by design.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::prefetch::PrefetchRequest;
use crate::state::AppState;
use crate::web::error::ApiError;

#[derive(Deserialize)]
pub struct PrefetchParams {
    #[serde(default)]
    pub query: String,
    pub collection: Option<String>,
    pub profile: Option<String>,
    /// Explicit TTL override in seconds.
    pub ttl: Option<u64>,
}

pub(super) async fn prefetch(
    State(state): State<AppState>,
    Query(params): Query<PrefetchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::missing_query());
    }

    let key = state.prefetcher.schedule(PrefetchRequest {
        query: query.to_owned(),
        collection: params.collection,
        profile: params.profile,
        ttl_override: params.ttl.map(Duration::from_secs),
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "cacheKey": key,
        })),
    ))
}
