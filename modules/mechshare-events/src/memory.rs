//! In-process EventStore. Same semantics as the Postgres store: ids start at
//! 1 and increase with insertion order, which is also the tie-breaker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::EventStore;
use crate::types::{EventKind, InteractionEvent};

#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<InteractionEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_key(
    event: &InteractionEvent,
    subject_id: i64,
    actor_id: Option<i64>,
    kind: EventKind,
) -> bool {
    event.subject_id == subject_id && event.actor_id == actor_id && event.kind == kind
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Result<InteractionEvent> {
        let mut events = self.events.lock().await;
        let event = InteractionEvent {
            id: events.len() as i64 + 1,
            subject_id,
            actor_id,
            kind,
            occurred_at: now,
        };
        events.push(event.clone());
        Ok(event)
    }

    async fn find_most_recent(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
    ) -> Result<Option<InteractionEvent>> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| matches_key(e, subject_id, actor_id, kind))
            .max_by_key(|e| (e.occurred_at, e.id))
            .cloned())
    }

    async fn count_total(&self, subject_id: i64, kind: EventKind) -> Result<i64> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| e.subject_id == subject_id && e.kind == kind)
            .count() as i64)
    }

    async fn count_for_actor(
        &self,
        subject_id: i64,
        actor_id: i64,
        kind: EventKind,
    ) -> Result<i64> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| matches_key(e, subject_id, Some(actor_id), kind))
            .count() as i64)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryEventStore {
    /// Rewrite an event's timestamp to simulate elapsed time.
    pub async fn backdate(&self, event_id: i64, occurred_at: DateTime<Utc>) {
        let mut events = self.events.lock().await;
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.occurred_at = occurred_at;
        }
    }

    pub async fn read_all(&self) -> Vec<InteractionEvent> {
        self.events.lock().await.clone()
    }
}
