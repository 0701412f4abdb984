//! Suggestion fragment handler.
//!
//! `GET /suggest?query=&collection=&profile=` — cached query completions
//! from the backend's suggestion form. Queries below the minimum length
//! return an empty result without touching cache or origin.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::cache::entry::{CacheEntry, PayloadFormat};
use crate::cache::key::{KeyKind, suggestion_key};
use crate::origin::OriginRequest;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::routes::fragment_response;

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub query: String,
    pub collection: Option<String>,
    pub profile: Option<String>,
}

pub(super) async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Response, ApiError> {
    let query = params.query.trim();
    if query.chars().count() < state.config.suggest_min_query_length {
        return Ok((StatusCode::OK, Json(json!([]))).into_response());
    }

    let collection = params.collection.as_deref();
    let profile = params.profile.as_deref();
    let key = suggestion_key(query, collection, profile);
    state.popularity.record(query);

    if let Some(entry) = state.store.get(&key).await {
        return Ok(fragment_response(
            StatusCode::OK,
            entry.format.content_type(),
            "HIT",
            KeyKind::Suggestion,
            None,
            entry.payload,
        ));
    }

    let origin_request = OriginRequest {
        kind: KeyKind::Suggestion,
        query: query.to_owned(),
        collection: collection.map(String::from),
        profile: profile.map(String::from),
        session_id: None,
        tab_filters: Vec::new(),
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
    let entry = CacheEntry::new(
        response.body.clone(),
        format,
        state.ttl_policy.tiers().suggestion,
    );
    if state.store.set(&key, &entry).await {
        state.popularity.record(query);
    }

    Ok(fragment_response(
        StatusCode::OK,
        format.content_type(),
        "MISS",
        KeyKind::Suggestion,
        None,
        entry.payload,
    ))
}
