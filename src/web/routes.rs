//! Web API router construction and shared response utilities.

use axum::Router;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::cache::key::KeyKind;
use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{admin, prefetch, probe, search, status, suggest};

/// Creates the web server router
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/metrics", get(status::metrics))
        .route("/cache", delete(admin::purge_cache))
        .with_state(state.clone());

    let router = Router::new()
        .route("/search", get(search::search))
        .route("/suggest", get(suggest::suggest))
        .route("/cache-check", get(probe::cache_check))
        .route("/prefetch", get(prefetch::prefetch))
        .nest("/api", api_router)
        .with_state(state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        // The search UI calls these endpoints cross-origin and reads the
        // X-Cache-* headers from script.
        CorsLayer::permissive(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}

/// Build a fragment response with the cache-diagnostic headers the client
/// race logic reads: `X-Cache-Status`, `X-Cache-Type`, and (for tab-scoped
/// requests) `X-Cache-Tab-ID`.
pub fn fragment_response(
    status: StatusCode,
    content_type: &'static str,
    cache_status: &'static str,
    kind: KeyKind,
    tab_id: Option<&str>,
    body: String,
) -> Response {
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert("x-cache-status", HeaderValue::from_static(cache_status));
    headers.insert("x-cache-type", HeaderValue::from_static(kind.as_str()));
    if let Some(tab_id) = tab_id
        && let Ok(value) = HeaderValue::from_str(tab_id)
    {
        headers.insert("x-cache-tab-id", value);
    }
    response
}
