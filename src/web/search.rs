//! Search and tab fragment handler.
//!
//! `GET /search?query=&collection=&profile=&tab=&form=&sessionId=&f.Tabs|...=`
//!
//! The handler checks cache before hitting origin; on a cold key the origin
//! fetch runs under singleflight so simultaneous misses for one key share a
//! single upstream request. Responses always carry `X-Cache-Status` and
//! `X-Cache-Type` (plus `X-Cache-Tab-ID` for tab-scoped requests) so the
//! client race logic can tell which path actually served.

use axum::extract::{Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::entry::{CacheEntry, PayloadFormat};
use crate::cache::key::{KeyKind, search_key, tab_key};
use crate::cache::ttl::ContentClass;
use crate::origin::OriginRequest;
use crate::state::AppState;
use crate::tabs::TabDescriptor;
use crate::web::error::ApiError;
use crate::web::routes::fragment_response;

pub(super) async fn search(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let Some(query) = params.get("query").map(|q| q.trim()).filter(|q| !q.is_empty()) else {
        return Err(ApiError::missing_query());
    };
    let collection = params.get("collection").map(String::as_str);
    let profile = params.get("profile").map(String::as_str);
    let raw_query = raw_query.unwrap_or_default();

    let tab = state.tab_rules.classify(&params, &raw_query);
    let (kind, key) = match &tab {
        Some(descriptor) => (
            KeyKind::Tab,
            tab_key(query, collection, &descriptor.normalized_id, &state.tab_rules),
        ),
        None => (KeyKind::Search, search_key(query, collection, profile)),
    };
    let tab_id = tab.as_ref().map(|descriptor| descriptor.normalized_id.as_str());

    // Every request is a traffic event, hit or miss.
    let traffic = state.popularity.record(query);

    if let Some(entry) = state.store.get(&key).await {
        return Ok(fragment_response(
            StatusCode::OK,
            entry.format.content_type(),
            "HIT",
            kind,
            tab_id,
            entry.payload,
        ));
    }

    // Cold key: fetch from origin, deduplicated per key.
    let origin_request = OriginRequest {
        kind,
        query: query.to_owned(),
        collection: collection.map(String::from),
        profile: profile.map(String::from),
        session_id: params.get("sessionId").cloned(),
        tab_filters: facet_filters(&params),
    };
    let origin = state.origin.clone();
    let outcome = state
        .origin_flights
        .run(&key, || async move { Arc::new(origin.fetch(&origin_request).await) })
        .await;

    let response = match outcome.as_ref() {
        Ok(response) => response,
        Err(e) => return Err(ApiError::origin(e)),
    };

    let format = PayloadFormat::detect(response.content_type.as_deref(), &response.body);
    let ttl = match &tab {
        Some(descriptor) => tab_ttl(&state, descriptor, traffic),
        None => {
            // Time-sensitive queries start from the short base; either way
            // the popularity axis escalates from there.
            let tiers = state.ttl_policy.tiers();
            let base = if ContentClass::classify(query) == ContentClass::TimeSensitive {
                tiers.time_sensitive
            } else {
                tiers.search
            };
            state.ttl_policy.recommended_ttl(query, base)
        }
    };

    let entry = CacheEntry::new(response.body.clone(), format, ttl);
    if state.store.set(&key, &entry).await {
        // The write is its own traffic event, matching reads.
        state.popularity.record(query);
    }
    debug!(key, ttl_seconds = entry.ttl_seconds, "fragment cached");

    Ok(fragment_response(
        StatusCode::OK,
        format.content_type(),
        "MISS",
        kind,
        tab_id,
        entry.payload,
    ))
}

/// Content-class TTL for a tab fragment; heavily trafficked tabs take the
/// popular-tab tier regardless of class.
fn tab_ttl(state: &AppState, descriptor: &TabDescriptor, traffic: u64) -> std::time::Duration {
    let class = match ContentClass::classify(&descriptor.normalized_id) {
        ContentClass::General => ContentClass::TabContent,
        class => class,
    };
    let popular = traffic >= state.config.popular_threshold;
    state.ttl_policy.content_specific_ttl(class, popular)
}

/// Facet-style tab filter parameters, forwarded to origin verbatim.
fn facet_filters(params: &HashMap<String, String>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(name, _)| name.starts_with("f.Tabs|"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
