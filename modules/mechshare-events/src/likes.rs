//! Likes: at most one per (user, mechanism), enforced by the table's unique
//! key rather than a read-then-write check.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Created,
    AlreadyLiked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PopularMechanism {
    pub mechanism_id: i64,
    pub title: String,
    pub likes_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LikedMechanism {
    pub mechanism_id: i64,
    pub title: String,
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    async fn like(&self, user_id: i64, mechanism_id: i64) -> Result<LikeOutcome>;

    /// Returns false when there was nothing to remove.
    async fn unlike(&self, user_id: i64, mechanism_id: i64) -> Result<bool>;

    async fn count(&self, mechanism_id: i64) -> Result<i64>;

    async fn has_liked(&self, user_id: i64, mechanism_id: i64) -> Result<bool>;

    /// Most liked first; ties by mechanism id ascending. `limit = 0` is empty.
    async fn popular(&self, limit: i64) -> Result<Vec<PopularMechanism>>;

    /// Mechanisms the user has liked, by mechanism id, after skipping `skip`.
    async fn liked_by(&self, user_id: i64, skip: i64, limit: i64)
        -> Result<Vec<LikedMechanism>>;
}

// ---------------------------------------------------------------------------
// PgLikeStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgLikeStore {
    pool: PgPool,
}

impl PgLikeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeStore for PgLikeStore {
    async fn like(&self, user_id: i64, mechanism_id: i64) -> Result<LikeOutcome> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO likes (user_id, mechanism_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, mechanism_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(mechanism_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(_) => LikeOutcome::Created,
            None => LikeOutcome::AlreadyLiked,
        })
    }

    async fn unlike(&self, user_id: i64, mechanism_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND mechanism_id = $2")
            .bind(user_id)
            .bind(mechanism_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, mechanism_id: i64) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM likes WHERE mechanism_id = $1")
            .bind(mechanism_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    async fn has_liked(&self, user_id: i64, mechanism_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND mechanism_id = $2)",
        )
        .bind(user_id)
        .bind(mechanism_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn popular(&self, limit: i64) -> Result<Vec<PopularMechanism>> {
        let rows = sqlx::query_as::<_, PopularMechanism>(
            r#"
            SELECT m.id AS mechanism_id, m.title, COUNT(l.id) AS likes_count
            FROM likes l
            JOIN mechanisms m ON m.id = l.mechanism_id
            GROUP BY m.id, m.title
            ORDER BY likes_count DESC, m.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn liked_by(
        &self,
        user_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<LikedMechanism>> {
        let rows = sqlx::query_as::<_, LikedMechanism>(
            r#"
            SELECT m.id AS mechanism_id, m.title
            FROM likes l
            JOIN mechanisms m ON m.id = l.mechanism_id
            WHERE l.user_id = $1
            ORDER BY m.id ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// MemoryLikeStore
// ---------------------------------------------------------------------------

/// Likes keyed by (user, mechanism). Listings only include mechanisms
/// registered with [`MemoryLikeStore::with_title`], the same way the Postgres
/// listings join against `mechanisms`.
#[derive(Default)]
pub struct MemoryLikeStore {
    likes: Mutex<BTreeSet<(i64, i64)>>,
    titles: HashMap<i64, String>,
}

impl MemoryLikeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, mechanism_id: i64, title: &str) -> Self {
        self.titles.insert(mechanism_id, title.to_string());
        self
    }
}

#[async_trait]
impl LikeStore for MemoryLikeStore {
    async fn like(&self, user_id: i64, mechanism_id: i64) -> Result<LikeOutcome> {
        let mut likes = self.likes.lock().await;
        Ok(if likes.insert((user_id, mechanism_id)) {
            LikeOutcome::Created
        } else {
            LikeOutcome::AlreadyLiked
        })
    }

    async fn unlike(&self, user_id: i64, mechanism_id: i64) -> Result<bool> {
        Ok(self.likes.lock().await.remove(&(user_id, mechanism_id)))
    }

    async fn count(&self, mechanism_id: i64) -> Result<i64> {
        let likes = self.likes.lock().await;
        Ok(likes.iter().filter(|(_, m)| *m == mechanism_id).count() as i64)
    }

    async fn has_liked(&self, user_id: i64, mechanism_id: i64) -> Result<bool> {
        Ok(self.likes.lock().await.contains(&(user_id, mechanism_id)))
    }

    async fn popular(&self, limit: i64) -> Result<Vec<PopularMechanism>> {
        let likes = self.likes.lock().await;
        let mut counts: BTreeMap<i64, i64> = BTreeMap::new();
        for (_, mechanism_id) in likes.iter() {
            *counts.entry(*mechanism_id).or_default() += 1;
        }

        let mut ranked: Vec<PopularMechanism> = counts
            .into_iter()
            .filter_map(|(mechanism_id, likes_count)| {
                let title = self.titles.get(&mechanism_id)?.clone();
                Some(PopularMechanism {
                    mechanism_id,
                    title,
                    likes_count,
                })
            })
            .collect();
        // Stable sort keeps the BTreeMap's ascending id order among ties.
        ranked.sort_by(|a, b| b.likes_count.cmp(&a.likes_count));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }

    async fn liked_by(
        &self,
        user_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<LikedMechanism>> {
        let likes = self.likes.lock().await;
        Ok(likes
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, mechanism_id)| {
                let title = self.titles.get(mechanism_id)?.clone();
                Some(LikedMechanism {
                    mechanism_id: *mechanism_id,
                    title,
                })
            })
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
