use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::rest::{
    self, files,
    interactions::{self, Downloads, Views},
    likes,
};
use crate::AppState;

pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/api/health", get(rest::health))
        // Views
        .route("/api/mechanisms/{id}/view", post(interactions::record::<Views>))
        .route("/api/mechanisms/{id}/views", get(interactions::stats::<Views>))
        .route("/api/mechanisms/views/batch", post(interactions::batch_stats::<Views>))
        // Downloads
        .route("/api/mechanisms/{id}/download", post(interactions::record::<Downloads>))
        .route("/api/mechanisms/{id}/downloads", get(interactions::stats::<Downloads>))
        .route(
            "/api/mechanisms/downloads/batch",
            post(interactions::batch_stats::<Downloads>),
        )
        .route("/api/mechanisms/{id}/file", get(files::download_file))
        // Likes
        .route("/api/likes/popular", get(likes::popular))
        .route("/api/likes/mechanism/{id}", get(likes::count))
        .route("/api/likes/user/{user_id}/liked", get(likes::liked_by))
        .route("/api/likes/{id}", post(likes::like).delete(likes::unlike))
        .with_state(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
