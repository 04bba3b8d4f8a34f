//! Session repository for login sessions

use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

/// A stored login session. Only the argon2 hash of the secret is kept.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: UserId,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        id: &str,
        user_id: &UserId,
        secret_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord>;

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>>;

    async fn revoke_session(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxSessionRepository {
    pool: DbPool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    #[instrument(skip(self, secret_hash), fields(session_id = %id, user_id = %user_id), name = "db_create_session")]
    async fn create_session(
        &self,
        id: &str,
        user_id: &UserId,
        secret_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO sessions (id, user_id, secret_hash, expires_at, revoked, created_at)
             VALUES ($1, $2, $3, $4, FALSE, $5)
             RETURNING id, user_id, secret_hash, expires_at, revoked, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(secret_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to create session"))
    }

    #[instrument(skip(self), fields(session_id = %id), name = "db_get_session")]
    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, secret_hash, expires_at, revoked, created_at
             FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to fetch session: {}", id)))
    }

    #[instrument(skip(self), fields(session_id = %id), name = "db_revoke_session")]
    async fn revoke_session(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET revoked = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e, format!("Failed to revoke session: {}", id)))?;
        Ok(())
    }
}
