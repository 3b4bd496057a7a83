use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use crate::error::ApiError;
use crate::jwt::{parse_auth_cookie, JwtService};
use crate::AppState;

/// Caller identity for endpoints that also serve anonymous users. Missing or
/// invalid credentials, or a token for a user that no longer exists, resolve
/// to `MaybeUser(None)`, never a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUser(pub Option<i64>);

/// Caller identity for endpoints that require a logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(parts, state).await?))
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// The token's user, if the token is valid and the user is still on record.
async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<i64>, ApiError> {
    let Some(user_id) = user_from_parts(parts, &state.jwt) else {
        return Ok(None);
    };
    if state.subjects.user_exists(user_id).await? {
        Ok(Some(user_id))
    } else {
        debug!(user_id, "Ignoring token for unknown user");
        Ok(None)
    }
}

/// Bearer header first, then the `auth_token` cookie.
fn user_from_parts(parts: &Parts, jwt: &JwtService) -> Option<i64> {
    let token = bearer_token(parts).or_else(|| {
        parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_auth_cookie)
    })?;

    match jwt.user_id(token) {
        Ok(user_id) => Some(user_id),
        Err(e) => {
            debug!(error = %e, "Ignoring invalid auth token");
            None
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
