pub mod files;
pub mod interactions;
pub mod likes;

use std::sync::Arc;

use axum::response::Json;
use mechshare_events::validate_id;

use crate::error::ApiError;
use crate::AppState;

// --- Helpers ---

/// Path ids must be positive integers.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    parse_key("mechanism_id", raw)
}

pub fn parse_key(what: &str, raw: &str) -> Result<i64, ApiError> {
    let id: i64 = raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {what} {raw:?}")))?;
    validate_id(what, id)?;
    Ok(id)
}

pub async fn ensure_mechanism(state: &Arc<AppState>, mechanism_id: i64) -> Result<(), ApiError> {
    if state.subjects.exists(mechanism_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("mechanism not found".to_string()))
    }
}

// --- Handlers ---

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
