//! Record-or-reuse for a single interaction.
//!
//! Read-then-write, not atomic: two concurrent calls on a cold key can both
//! append. Dedup is best-effort unless the table gains a bucketed unique key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::policy::{Decision, DedupPolicy};
use crate::store::EventStore;
use crate::types::{EventKind, InteractionEvent};

/// Result of [`InteractionRecorder::record`]. `is_new` is false when the
/// interaction was absorbed into an event already inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recorded {
    pub event: InteractionEvent,
    pub is_new: bool,
}

#[derive(Clone)]
pub struct InteractionRecorder {
    store: Arc<dyn EventStore>,
    policy: DedupPolicy,
}

impl InteractionRecorder {
    pub fn new(store: Arc<dyn EventStore>, policy: DedupPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Writes zero or one row. Never mutates an existing row. A failed read
    /// is an error, not an empty history.
    pub async fn record(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Result<Recorded> {
        let latest = self
            .store
            .find_most_recent(subject_id, actor_id, kind)
            .await?;

        match self.policy.decide(latest, now) {
            Decision::Reuse(event) => {
                debug!(subject_id, ?actor_id, %kind, event_id = event.id, "Interaction absorbed");
                Ok(Recorded {
                    event,
                    is_new: false,
                })
            }
            Decision::CreateNew => {
                let event = self.store.append(subject_id, actor_id, kind, now).await?;
                debug!(subject_id, ?actor_id, %kind, event_id = event.id, "Interaction recorded");
                Ok(Recorded {
                    event,
                    is_new: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InteractionError;
    use crate::memory::MemoryEventStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn recorder(store: Arc<MemoryEventStore>) -> InteractionRecorder {
        InteractionRecorder::new(store, DedupPolicy::default())
    }

    /// Store whose reads or writes fail on demand.
    struct FailingStore {
        fail_reads: bool,
    }

    #[async_trait]
    impl EventStore for FailingStore {
        async fn append(
            &self,
            _subject_id: i64,
            _actor_id: Option<i64>,
            _kind: EventKind,
            _now: DateTime<Utc>,
        ) -> Result<InteractionEvent> {
            Err(InteractionError::Storage("insert rejected".into()))
        }

        async fn find_most_recent(
            &self,
            _subject_id: i64,
            _actor_id: Option<i64>,
            _kind: EventKind,
        ) -> Result<Option<InteractionEvent>> {
            if self.fail_reads {
                Err(InteractionError::Storage("connection reset".into()))
            } else {
                Ok(None)
            }
        }

        async fn count_total(&self, _subject_id: i64, _kind: EventKind) -> Result<i64> {
            Ok(0)
        }

        async fn count_for_actor(
            &self,
            _subject_id: i64,
            _actor_id: i64,
            _kind: EventKind,
        ) -> Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn repeat_within_window_returns_same_event() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        let first = rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        let second = rec
            .record(1, Some(1), EventKind::View, t0() + Duration::seconds(60))
            .await
            .unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(second.event, first.event);
        assert_eq!(store.read_all().await.len(), 1);
    }

    #[tokio::test]
    async fn repeat_after_window_creates_new_event() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        let first = rec.record(1, Some(1), EventKind::Download, t0()).await.unwrap();
        let second = rec
            .record(1, Some(1), EventKind::Download, t0() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(second.is_new);
        assert_ne!(second.event.id, first.event.id);
        assert_eq!(second.event.occurred_at, t0() + Duration::minutes(5));
    }

    #[tokio::test]
    async fn reused_event_keeps_its_original_timestamp() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        rec.record(1, None, EventKind::View, t0()).await.unwrap();
        let again = rec
            .record(1, None, EventKind::View, t0() + Duration::seconds(200))
            .await
            .unwrap();

        assert_eq!(again.event.occurred_at, t0());
    }

    #[tokio::test]
    async fn window_is_measured_from_latest_event_not_latest_request() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        // Absorbed requests do not extend the window.
        rec.record(1, Some(1), EventKind::View, t0() + Duration::seconds(240))
            .await
            .unwrap();
        let third = rec
            .record(1, Some(1), EventKind::View, t0() + Duration::seconds(310))
            .await
            .unwrap();

        assert!(third.is_new);
        assert_eq!(store.read_all().await.len(), 2);
    }

    #[tokio::test]
    async fn backdated_event_no_longer_absorbs() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        let first = rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        store
            .backdate(first.event.id, t0() - Duration::minutes(6))
            .await;

        let second = rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        assert!(second.is_new);
    }

    #[tokio::test]
    async fn kinds_do_not_absorb_each_other() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        let download = rec.record(1, Some(1), EventKind::Download, t0()).await.unwrap();
        assert!(download.is_new);
    }

    #[tokio::test]
    async fn anonymous_and_known_actor_are_different_keys() {
        let store = Arc::new(MemoryEventStore::new());
        let rec = recorder(store.clone());

        let anon = rec.record(1, None, EventKind::View, t0()).await.unwrap();
        let known = rec.record(1, Some(1), EventKind::View, t0()).await.unwrap();
        let anon_again = rec
            .record(1, None, EventKind::View, t0() + Duration::seconds(5))
            .await
            .unwrap();

        assert!(anon.is_new);
        assert!(known.is_new);
        assert!(!anon_again.is_new);
        assert_eq!(anon_again.event.id, anon.event.id);
    }

    #[tokio::test]
    async fn read_failure_propagates_instead_of_appending() {
        let rec = InteractionRecorder::new(
            Arc::new(FailingStore { fail_reads: true }),
            DedupPolicy::default(),
        );
        let err = rec.record(1, Some(1), EventKind::View, t0()).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn append_failure_propagates() {
        let rec = InteractionRecorder::new(
            Arc::new(FailingStore { fail_reads: false }),
            DedupPolicy::default(),
        );
        let err = rec.record(1, None, EventKind::Download, t0()).await.unwrap_err();
        assert!(matches!(err, InteractionError::Storage(_)));
    }
}
