//! View and download counts, single and batched.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::store::EventStore;
use crate::types::EventKind;

/// Counts for one subject. `actor_count` is `None` when no actor was given,
/// which is distinct from `Some(0)` for an actor with no events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionStats {
    pub subject_id: i64,
    pub kind: EventKind,
    pub total_count: i64,
    pub actor_count: Option<i64>,
}

/// Reads counts straight from the store on every call.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn EventStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn stats_for(
        &self,
        subject_id: i64,
        kind: EventKind,
        actor_id: Option<i64>,
    ) -> Result<InteractionStats> {
        let total_count = self.store.count_total(subject_id, kind).await?;
        let actor_count = match actor_id {
            Some(actor_id) => Some(self.store.count_for_actor(subject_id, actor_id, kind).await?),
            None => None,
        };

        Ok(InteractionStats {
            subject_id,
            kind,
            total_count,
            actor_count,
        })
    }

    /// One entry per input id, in input order. Duplicate ids are repeated.
    pub async fn batch_stats_for(
        &self,
        subject_ids: &[i64],
        kind: EventKind,
        actor_id: Option<i64>,
    ) -> Result<Vec<InteractionStats>> {
        if subject_ids.is_empty() {
            return Ok(Vec::new());
        }

        let totals = self.store.count_totals(subject_ids, kind).await?;
        let actor_counts = match actor_id {
            Some(actor_id) => Some(
                self.store
                    .count_totals_for_actor(subject_ids, actor_id, kind)
                    .await?,
            ),
            None => None,
        };

        Ok(subject_ids
            .iter()
            .map(|&subject_id| InteractionStats {
                subject_id,
                kind,
                total_count: totals.get(&subject_id).copied().unwrap_or(0),
                actor_count: actor_counts
                    .as_ref()
                    .map(|counts| counts.get(&subject_id).copied().unwrap_or(0)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEventStore;
    use crate::types::InteractionEvent;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn actor_count_absent_without_actor() {
        let store = Arc::new(MemoryEventStore::new());
        store.append(1, Some(4), EventKind::View, t0()).await.unwrap();

        let stats = StatsAggregator::new(store)
            .stats_for(1, EventKind::View, None)
            .await
            .unwrap();
        assert_eq!(stats.total_count, 1);
        assert_eq!(stats.actor_count, None);
    }

    #[tokio::test]
    async fn actor_count_zero_is_not_absent() {
        let store = Arc::new(MemoryEventStore::new());
        store.append(1, Some(4), EventKind::View, t0()).await.unwrap();

        let stats = StatsAggregator::new(store)
            .stats_for(1, EventKind::View, Some(5))
            .await
            .unwrap();
        assert_eq!(stats.actor_count, Some(0));
    }

    #[tokio::test]
    async fn actor_count_never_exceeds_total() {
        let store = Arc::new(MemoryEventStore::new());
        for actor in [Some(1), Some(1), Some(2), None] {
            store.append(3, actor, EventKind::Download, t0()).await.unwrap();
        }

        let agg = StatsAggregator::new(store);
        for actor in 1..=3 {
            let stats = agg.stats_for(3, EventKind::Download, Some(actor)).await.unwrap();
            assert!(stats.actor_count.unwrap() <= stats.total_count);
        }
    }

    #[tokio::test]
    async fn batch_keeps_duplicates_and_empty_input() {
        let store = Arc::new(MemoryEventStore::new());
        store.append(7, None, EventKind::View, t0()).await.unwrap();

        let agg = StatsAggregator::new(store);
        assert!(agg.batch_stats_for(&[], EventKind::View, None).await.unwrap().is_empty());

        let items = agg
            .batch_stats_for(&[7, 8, 7], EventKind::View, None)
            .await
            .unwrap();
        let ids: Vec<i64> = items.iter().map(|s| s.subject_id).collect();
        assert_eq!(ids, vec![7, 8, 7]);
        assert_eq!(items[0], items[2]);
        assert_eq!(items[1].total_count, 0);
    }

    /// Returns batched counts in an order unrelated to the request.
    struct ShuffledStore;

    #[async_trait]
    impl EventStore for ShuffledStore {
        async fn append(
            &self,
            _: i64,
            _: Option<i64>,
            _: EventKind,
            _: DateTime<Utc>,
        ) -> Result<InteractionEvent> {
            unreachable!("stats never append")
        }

        async fn find_most_recent(
            &self,
            _: i64,
            _: Option<i64>,
            _: EventKind,
        ) -> Result<Option<InteractionEvent>> {
            Ok(None)
        }

        async fn count_total(&self, subject_id: i64, _: EventKind) -> Result<i64> {
            Ok(subject_id * 10)
        }

        async fn count_for_actor(&self, subject_id: i64, _: i64, _: EventKind) -> Result<i64> {
            Ok(subject_id)
        }

        async fn count_totals(
            &self,
            subject_ids: &[i64],
            _: EventKind,
        ) -> Result<HashMap<i64, i64>> {
            let mut ids = subject_ids.to_vec();
            ids.sort_unstable_by(|a, b| b.cmp(a));
            Ok(ids.into_iter().map(|id| (id, id * 10)).collect())
        }
    }

    #[tokio::test]
    async fn batch_preserves_input_order_regardless_of_store_order() {
        let agg = StatsAggregator::new(Arc::new(ShuffledStore));
        let items = agg
            .batch_stats_for(&[3, 1, 2], EventKind::View, Some(9))
            .await
            .unwrap();

        let totals: Vec<(i64, i64, Option<i64>)> = items
            .iter()
            .map(|s| (s.subject_id, s.total_count, s.actor_count))
            .collect();
        assert_eq!(
            totals,
            vec![(3, 30, Some(3)), (1, 10, Some(1)), (2, 20, Some(2))]
        );
    }
}
