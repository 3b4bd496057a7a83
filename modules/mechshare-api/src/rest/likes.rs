use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use mechshare_events::{LikedMechanism, LikeOutcome, PopularMechanism};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::rest::{ensure_mechanism, parse_id, parse_key};
use crate::AppState;

const DEFAULT_POPULAR_LIMIT: i64 = 10;
const MAX_POPULAR_LIMIT: i64 = 100;
const DEFAULT_LIKED_LIMIT: i64 = 100;
const MAX_LIKED_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct LikeCount {
    pub mechanism_id: i64,
    pub likes_count: i64,
}

#[derive(Deserialize)]
pub struct PopularQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct LikedQuery {
    skip: Option<i64>,
    limit: Option<i64>,
}

pub async fn like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LikeCount>, ApiError> {
    let mechanism_id = parse_id(&id)?;
    ensure_mechanism(&state, mechanism_id).await?;

    if state.likes.like(user_id, mechanism_id).await? == LikeOutcome::AlreadyLiked {
        return Err(ApiError::BadRequest("already liked".to_string()));
    }

    let likes_count = state.likes.count(mechanism_id).await?;
    Ok(Json(LikeCount {
        mechanism_id,
        likes_count,
    }))
}

pub async fn unlike(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LikeCount>, ApiError> {
    let mechanism_id = parse_id(&id)?;

    if !state.likes.unlike(user_id, mechanism_id).await? {
        return Err(ApiError::NotFound("like not found".to_string()));
    }

    let likes_count = state.likes.count(mechanism_id).await?;
    Ok(Json(LikeCount {
        mechanism_id,
        likes_count,
    }))
}

pub async fn count(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LikeCount>, ApiError> {
    let mechanism_id = parse_id(&id)?;
    let likes_count = state.likes.count(mechanism_id).await?;
    Ok(Json(LikeCount {
        mechanism_id,
        likes_count,
    }))
}

pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularQuery>,
) -> Result<Json<Vec<PopularMechanism>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_POPULAR_LIMIT)
        .clamp(0, MAX_POPULAR_LIMIT);
    Ok(Json(state.likes.popular(limit).await?))
}

/// Public listing; an unknown user simply has no likes.
pub async fn liked_by(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<LikedQuery>,
) -> Result<Json<Vec<LikedMechanism>>, ApiError> {
    let user_id = parse_key("user_id", &user_id)?;
    let skip = params.skip.unwrap_or(0);
    if skip < 0 {
        return Err(ApiError::BadRequest("skip must not be negative".to_string()));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIKED_LIMIT)
        .clamp(0, MAX_LIKED_LIMIT);

    Ok(Json(state.likes.liked_by(user_id, skip, limit).await?))
}
