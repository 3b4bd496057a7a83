//! Lookups the boundary needs: mechanism existence before recording or
//! counting, the stored file path for downloads, and whether a token's user
//! still exists.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait SubjectGateway: Send + Sync {
    async fn exists(&self, mechanism_id: i64) -> Result<bool>;

    /// `None` when the mechanism is missing or has no attached file.
    async fn file_path(&self, mechanism_id: i64) -> Result<Option<String>>;

    async fn user_exists(&self, user_id: i64) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgSubjectGateway {
    pool: PgPool,
}

impl PgSubjectGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectGateway for PgSubjectGateway {
    async fn exists(&self, mechanism_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM mechanisms WHERE id = $1)",
        )
        .bind(mechanism_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn file_path(&self, mechanism_id: i64) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT file_path FROM mechanisms WHERE id = $1",
        )
        .bind(mechanism_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(path,)| path))
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}

/// Fixed set of mechanisms and users, for tests and local runs without
/// Postgres.
#[derive(Default, Clone)]
pub struct MemorySubjectGateway {
    mechanisms: HashMap<i64, Option<String>>,
    users: HashSet<i64>,
}

impl MemorySubjectGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mechanism(mut self, mechanism_id: i64, file_path: Option<&str>) -> Self {
        self.mechanisms
            .insert(mechanism_id, file_path.map(String::from));
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.users.insert(user_id);
        self
    }
}

#[async_trait]
impl SubjectGateway for MemorySubjectGateway {
    async fn exists(&self, mechanism_id: i64) -> Result<bool> {
        Ok(self.mechanisms.contains_key(&mechanism_id))
    }

    async fn file_path(&self, mechanism_id: i64) -> Result<Option<String>> {
        Ok(self.mechanisms.get(&mechanism_id).cloned().flatten())
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool> {
        Ok(self.users.contains(&user_id))
    }
}
