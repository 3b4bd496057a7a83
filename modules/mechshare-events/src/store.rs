//! EventStore: append-only interaction log.
//!
//! No update or delete is exposed. The only way a row changes after insert is
//! the `test-utils` backdate hook used to simulate elapsed time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{InteractionError, Result};
use crate::types::{EventKind, InteractionEvent};

// ---------------------------------------------------------------------------
// EventStore trait
// ---------------------------------------------------------------------------

/// Durable storage for view and download events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event stamped `now`. Single atomic row insert.
    async fn append(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Result<InteractionEvent>;

    /// The latest event for the exact key. Ties on `occurred_at` go to the
    /// highest id. `actor_id = None` matches anonymous rows only.
    async fn find_most_recent(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
    ) -> Result<Option<InteractionEvent>>;

    /// All events for the subject, any actor.
    async fn count_total(&self, subject_id: i64, kind: EventKind) -> Result<i64>;

    async fn count_for_actor(&self, subject_id: i64, actor_id: i64, kind: EventKind)
        -> Result<i64>;

    /// Totals for several subjects. Subjects without events may be missing
    /// from the map.
    async fn count_totals(
        &self,
        subject_ids: &[i64],
        kind: EventKind,
    ) -> Result<HashMap<i64, i64>> {
        let mut counts = HashMap::with_capacity(subject_ids.len());
        for &subject_id in subject_ids {
            if !counts.contains_key(&subject_id) {
                counts.insert(subject_id, self.count_total(subject_id, kind).await?);
            }
        }
        Ok(counts)
    }

    async fn count_totals_for_actor(
        &self,
        subject_ids: &[i64],
        actor_id: i64,
        kind: EventKind,
    ) -> Result<HashMap<i64, i64>> {
        let mut counts = HashMap::with_capacity(subject_ids.len());
        for &subject_id in subject_ids {
            if !counts.contains_key(&subject_id) {
                counts.insert(
                    subject_id,
                    self.count_for_actor(subject_id, actor_id, kind).await?,
                );
            }
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// PgEventStore
// ---------------------------------------------------------------------------

/// Postgres-backed store over the `interaction_events` table.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
        now: DateTime<Utc>,
    ) -> Result<InteractionEvent> {
        let event = sqlx::query_as::<_, InteractionEvent>(
            r#"
            INSERT INTO interaction_events (subject_id, actor_id, kind, occurred_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, subject_id, actor_id, kind, occurred_at
            "#,
        )
        .bind(subject_id)
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    async fn find_most_recent(
        &self,
        subject_id: i64,
        actor_id: Option<i64>,
        kind: EventKind,
    ) -> Result<Option<InteractionEvent>> {
        // Split on actor presence so both shapes can use the key index.
        let row = match actor_id {
            Some(actor_id) => {
                sqlx::query_as::<_, InteractionEvent>(
                    r#"
                    SELECT id, subject_id, actor_id, kind, occurred_at
                    FROM interaction_events
                    WHERE subject_id = $1 AND kind = $2 AND actor_id = $3
                    ORDER BY occurred_at DESC, id DESC
                    LIMIT 1
                    "#,
                )
                .bind(subject_id)
                .bind(kind.as_str())
                .bind(actor_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, InteractionEvent>(
                    r#"
                    SELECT id, subject_id, actor_id, kind, occurred_at
                    FROM interaction_events
                    WHERE subject_id = $1 AND kind = $2 AND actor_id IS NULL
                    ORDER BY occurred_at DESC, id DESC
                    LIMIT 1
                    "#,
                )
                .bind(subject_id)
                .bind(kind.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row)
    }

    async fn count_total(&self, subject_id: i64, kind: EventKind) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM interaction_events WHERE subject_id = $1 AND kind = $2",
        )
        .bind(subject_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn count_for_actor(
        &self,
        subject_id: i64,
        actor_id: i64,
        kind: EventKind,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*) FROM interaction_events
            WHERE subject_id = $1 AND kind = $2 AND actor_id = $3
            "#,
        )
        .bind(subject_id)
        .bind(kind.as_str())
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn count_totals(
        &self,
        subject_ids: &[i64],
        kind: EventKind,
    ) -> Result<HashMap<i64, i64>> {
        if subject_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT subject_id, COUNT(*)
            FROM interaction_events
            WHERE subject_id = ANY($1) AND kind = $2
            GROUP BY subject_id
            "#,
        )
        .bind(subject_ids)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn count_totals_for_actor(
        &self,
        subject_ids: &[i64],
        actor_id: i64,
        kind: EventKind,
    ) -> Result<HashMap<i64, i64>> {
        if subject_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT subject_id, COUNT(*)
            FROM interaction_events
            WHERE subject_id = ANY($1) AND kind = $2 AND actor_id = $3
            GROUP BY subject_id
            "#,
        )
        .bind(subject_ids)
        .bind(kind.as_str())
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for InteractionEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for InteractionEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let kind: String = row.try_get("kind")?;
        let kind = kind
            .parse::<EventKind>()
            .map_err(|e: InteractionError| sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: Box::new(e),
            })?;

        Ok(InteractionEvent {
            id: row.try_get("id")?,
            subject_id: row.try_get("subject_id")?,
            actor_id: row.try_get("actor_id")?,
            kind,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl PgEventStore {
    /// Rewrite an event's timestamp to simulate elapsed time.
    pub async fn backdate(&self, event_id: i64, occurred_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE interaction_events SET occurred_at = $2 WHERE id = $1")
            .bind(event_id)
            .bind(occurred_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read all events in id order.
    pub async fn read_all(&self) -> Result<Vec<InteractionEvent>> {
        let rows = sqlx::query_as::<_, InteractionEvent>(
            r#"
            SELECT id, subject_id, actor_id, kind, occurred_at
            FROM interaction_events
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
