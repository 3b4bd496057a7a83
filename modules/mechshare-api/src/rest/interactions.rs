//! View and download endpoints. One set of handlers, mounted once per kind.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use mechshare_events::{validate_id, EventKind, InteractionEvent, InteractionStats};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::auth::MaybeUser;
use crate::error::ApiError;
use crate::rest::{ensure_mechanism, parse_id};
use crate::AppState;

/// Binds a handler instantiation to one interaction stream.
pub trait KindRoute: Send + Sync + 'static {
    const KIND: EventKind;
}

pub struct Views;
pub struct Downloads;

impl KindRoute for Views {
    const KIND: EventKind = EventKind::View;
}

impl KindRoute for Downloads {
    const KIND: EventKind = EventKind::Download;
}

// --- Wire shapes ---

fn timestamp_field(kind: EventKind) -> &'static str {
    match kind {
        EventKind::View => "viewed_at",
        EventKind::Download => "downloaded_at",
    }
}

fn count_fields(kind: EventKind) -> (&'static str, &'static str) {
    match kind {
        EventKind::View => ("total_views", "user_views"),
        EventKind::Download => ("total_downloads", "user_downloads"),
    }
}

/// `{id, mechanism_id, user_id?, kind, viewed_at | downloaded_at}`
pub struct EventBody(pub InteractionEvent);

impl Serialize for EventBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let event = &self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &event.id)?;
        map.serialize_entry("mechanism_id", &event.subject_id)?;
        if let Some(user_id) = event.actor_id {
            map.serialize_entry("user_id", &user_id)?;
        }
        map.serialize_entry("kind", &event.kind)?;
        map.serialize_entry(timestamp_field(event.kind), &event.occurred_at)?;
        map.end()
    }
}

/// `{mechanism_id, total_views, user_views?}` or the download equivalent.
/// The user field is left out entirely without an actor.
pub struct StatsBody(pub InteractionStats);

impl Serialize for StatsBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let stats = &self.0;
        let (total_key, user_key) = count_fields(stats.kind);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("mechanism_id", &stats.subject_id)?;
        map.serialize_entry(total_key, &stats.total_count)?;
        if let Some(user_count) = stats.actor_count {
            map.serialize_entry(user_key, &user_count)?;
        }
        map.end()
    }
}

#[derive(serde::Serialize)]
pub struct BatchBody {
    pub items: Vec<StatsBody>,
}

// --- Handlers ---

/// 201 when a new event was written, 200 when absorbed into a recent one.
pub async fn record<K: KindRoute>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeUser(user_id): MaybeUser,
) -> Result<impl IntoResponse, ApiError> {
    let mechanism_id = parse_id(&id)?;
    ensure_mechanism(&state, mechanism_id).await?;

    let recorded = state
        .recorder
        .record(mechanism_id, user_id, K::KIND, Utc::now())
        .await?;

    let status = if recorded.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(EventBody(recorded.event))))
}

pub async fn stats<K: KindRoute>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeUser(user_id): MaybeUser,
) -> Result<Json<StatsBody>, ApiError> {
    let mechanism_id = parse_id(&id)?;
    ensure_mechanism(&state, mechanism_id).await?;

    let stats = state.stats.stats_for(mechanism_id, K::KIND, user_id).await?;
    Ok(Json(StatsBody(stats)))
}

/// Body is a JSON array of mechanism ids. Existence is not checked; unknown
/// ids simply count zero.
pub async fn batch_stats<K: KindRoute>(
    State(state): State<Arc<AppState>>,
    MaybeUser(user_id): MaybeUser,
    body: Result<Json<Vec<i64>>, JsonRejection>,
) -> Result<Json<BatchBody>, ApiError> {
    let Json(mechanism_ids) = body?;
    if mechanism_ids.len() > state.max_batch_ids {
        return Err(ApiError::BadRequest(format!(
            "at most {} mechanism ids per request",
            state.max_batch_ids
        )));
    }
    for &id in &mechanism_ids {
        validate_id("mechanism_id", id)?;
    }

    let items = state
        .stats
        .batch_stats_for(&mechanism_ids, K::KIND, user_id)
        .await?;

    Ok(Json(BatchBody {
        items: items.into_iter().map(StatsBody).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn anonymous_event_omits_user_id() {
        let body = EventBody(InteractionEvent {
            id: 5,
            subject_id: 1,
            actor_id: None,
            kind: EventKind::Download,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        });

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "id": 5,
                "mechanism_id": 1,
                "kind": "download",
                "downloaded_at": "2024-03-01T12:00:00Z",
            })
        );
    }

    #[test]
    fn view_event_uses_viewed_at() {
        let body = EventBody(InteractionEvent {
            id: 1,
            subject_id: 2,
            actor_id: Some(3),
            kind: EventKind::View,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["user_id"], 3);
        assert!(value.get("viewed_at").is_some());
        assert!(value.get("downloaded_at").is_none());
    }

    #[test]
    fn stats_omit_user_count_without_actor_but_keep_zero() {
        let anonymous = StatsBody(InteractionStats {
            subject_id: 1,
            kind: EventKind::View,
            total_count: 4,
            actor_count: None,
        });
        assert_eq!(
            serde_json::to_value(&anonymous).unwrap(),
            json!({"mechanism_id": 1, "total_views": 4})
        );

        let known = StatsBody(InteractionStats {
            subject_id: 1,
            kind: EventKind::Download,
            total_count: 4,
            actor_count: Some(0),
        });
        assert_eq!(
            serde_json::to_value(&known).unwrap(),
            json!({"mechanism_id": 1, "total_downloads": 4, "user_downloads": 0})
        );
    }
}
