//! Cache administration.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::state::AppState;
use crate::web::error::ApiError;

#[derive(Deserialize)]
pub struct PurgeParams {
    #[serde(default)]
    pub pattern: String,
}

/// `DELETE /api/cache?pattern=tab:*` — remove every entry matching a glob
/// pattern with a single `*` wildcard.
pub(super) async fn purge_cache(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> Result<Json<Value>, ApiError> {
    let pattern = params.pattern.trim();
    if pattern.is_empty() {
        return Err(ApiError::invalid_pattern(pattern));
    }

    let deleted = state.store.delete_pattern(pattern).await;
    info!(pattern, deleted, "cache purged");

    Ok(Json(json!({
        "pattern": pattern,
        "deleted": deleted,
    })))
}
