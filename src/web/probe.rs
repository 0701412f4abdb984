//! Cache-existence probe.
//!
//! `GET /cache-check?query=&collection=&profile=` answers "is this query
//! cached?" cheaply — existence and remaining TTL only, never the payload.
//! The whole check is wall-clock bounded; on timeout or store error it
//! resolves to `exists: false` rather than raising, so a slow store can
//! never delay the client's fallback path.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::key::search_key;
use crate::cache::store::CacheStore;
use crate::metrics::ProbeOutcome;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProbeParams {
    #[serde(default)]
    pub query: String,
    pub collection: Option<String>,
    pub profile: Option<String>,
}

/// The settled result of a bounded probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProbeReply {
    pub exists: bool,
    pub ttl: Option<i64>,
    pub timed_out: bool,
}

impl ProbeReply {
    fn absent() -> Self {
        Self {
            exists: false,
            ttl: None,
            timed_out: false,
        }
    }

    fn timed_out() -> Self {
        Self {
            exists: false,
            ttl: None,
            timed_out: true,
        }
    }
}

/// Run an existence check under a deadline. Exceeding the deadline is a
/// negative result, never an error.
pub(crate) async fn with_probe_deadline<F>(limit: Duration, check: F) -> ProbeReply
where
    F: Future<Output = ProbeReply>,
{
    match tokio::time::timeout(limit, check).await {
        Ok(reply) => reply,
        Err(_) => ProbeReply::timed_out(),
    }
}

async fn check_store(store: &CacheStore, key: &str) -> ProbeReply {
    if !store.exists(key).await {
        return ProbeReply::absent();
    }
    ProbeReply {
        exists: true,
        ttl: store.ttl_remaining(key).await,
        timed_out: false,
    }
}

pub(super) async fn cache_check(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> Response {
    let start = Instant::now();
    let key = search_key(
        &params.query,
        params.collection.as_deref(),
        params.profile.as_deref(),
    );

    let reply = with_probe_deadline(
        state.config.probe_timeout,
        check_store(&state.store, &key),
    )
    .await;

    state.metrics.record_probe(if reply.timed_out {
        ProbeOutcome::TimedOut
    } else if reply.exists {
        ProbeOutcome::Hit
    } else {
        ProbeOutcome::Miss
    });
    if reply.timed_out {
        debug!(key, "cache probe timed out");
    }

    let check_time = format!("{}ms", start.elapsed().as_millis());
    let cache_status = if reply.exists { "HIT" } else { "MISS" };
    let headers = [
        ("x-cache-status", cache_status.to_owned()),
        ("x-cache-check-time", check_time),
    ];

    if reply.exists {
        (
            StatusCode::OK,
            headers,
            Json(json!({
                "exists": true,
                "cacheKey": key,
                "ttl": reply.ttl,
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            headers,
            Json(json!({ "exists": false })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_resolves_within_its_bound_when_the_store_hangs() {
        let wall_start = std::time::Instant::now();
        // A store that never answers.
        let stalled = async {
            std::future::pending::<()>().await;
            unreachable!()
        };
        let reply = with_probe_deadline(Duration::from_millis(50), stalled).await;
        assert!(!reply.exists);
        assert!(reply.timed_out);
        // The deadline, not the stalled store, bounds the wall clock.
        assert!(wall_start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn probe_reports_existence_and_ttl() {
        use crate::cache::entry::{CacheEntry, PayloadFormat};

        let store = CacheStore::memory(None);
        let key = "search:q:c:p";
        let reply = with_probe_deadline(Duration::from_secs(1), check_store(&store, key)).await;
        assert!(!reply.exists && !reply.timed_out);

        let entry = CacheEntry::new("body".into(), PayloadFormat::Html, Duration::from_secs(60));
        store.set(key, &entry).await;
        let reply = with_probe_deadline(Duration::from_secs(1), check_store(&store, key)).await;
        assert!(reply.exists);
        assert!(reply.ttl.is_some());
    }
}
