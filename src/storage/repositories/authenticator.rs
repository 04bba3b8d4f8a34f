//! Authenticator repository for second-factor enrollment records

use crate::auth::authenticator::{Authenticator, AuthenticatorKind};
use crate::domain::{AuthenticatorId, UserId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::instrument;

// Database row structures

#[derive(Debug, Clone, FromRow)]
struct AuthenticatorRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub config: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuthenticatorRow> for Authenticator {
    type Error = Error;

    fn try_from(row: AuthenticatorRow) -> Result<Self> {
        let kind = AuthenticatorKind::from_str(&row.kind).map_err(|e| {
            Error::validation(format!("Invalid authenticator kind '{}': {}", row.kind, e))
        })?;
        let config = serde_json::from_str(&row.config).map_err(|e| {
            Error::validation(format!("Invalid authenticator config JSON: {}", e))
        })?;

        Ok(Authenticator {
            id: AuthenticatorId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind,
            config,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        })
    }
}

const AUTHENTICATOR_COLUMNS: &str = "id, user_id, kind, config, created_at, last_used_at";

fn config_json(config: &serde_json::Value) -> Result<String> {
    serde_json::to_string(config)
        .map_err(|e| Error::validation(format!("Invalid authenticator config JSON: {}", e)))
}

// Repository traits

#[async_trait]
pub trait AuthenticatorRepository: Send + Sync {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Authenticator>>;

    async fn get_authenticator(&self, id: &AuthenticatorId) -> Result<Option<Authenticator>>;

    /// Insert an authenticator. When `recovery` is given, recovery codes are
    /// stored in the same transaction unless the user already has some.
    async fn create_authenticator(
        &self,
        user_id: &UserId,
        kind: AuthenticatorKind,
        config: serde_json::Value,
        recovery: Option<serde_json::Value>,
    ) -> Result<Authenticator>;

    /// Delete an authenticator owned by `user_id`, optionally together with
    /// the user's recovery codes.
    async fn delete_authenticator(
        &self,
        user_id: &UserId,
        id: &AuthenticatorId,
        remove_recovery: bool,
    ) -> Result<()>;
}

// SQLx implementations

#[derive(Debug, Clone)]
pub struct SqlxAuthenticatorRepository {
    pool: DbPool,
}

impl SqlxAuthenticatorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthenticatorRepository for SqlxAuthenticatorRepository {
    #[instrument(skip(self), fields(user_id = %user_id), name = "db_list_authenticators")]
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Authenticator>> {
        let rows = sqlx::query_as::<_, AuthenticatorRow>(&format!(
            "SELECT {} FROM authenticators WHERE user_id = $1 ORDER BY id",
            AUTHENTICATOR_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::database(e, format!("Failed to list authenticators for user {}", user_id))
        })?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    #[instrument(skip(self), fields(authenticator_id = %id), name = "db_get_authenticator")]
    async fn get_authenticator(&self, id: &AuthenticatorId) -> Result<Option<Authenticator>> {
        let row = sqlx::query_as::<_, AuthenticatorRow>(&format!(
            "SELECT {} FROM authenticators WHERE id = $1",
            AUTHENTICATOR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to fetch authenticator: {}", id)))?;

        row.map(|r| r.try_into()).transpose()
    }

    #[instrument(skip(self, config, recovery), fields(user_id = %user_id, kind = %kind), name = "db_create_authenticator")]
    async fn create_authenticator(
        &self,
        user_id: &UserId,
        kind: AuthenticatorKind,
        config: serde_json::Value,
        recovery: Option<serde_json::Value>,
    ) -> Result<Authenticator> {
        let now = Utc::now();
        let config = config_json(&config)?;
        let recovery = recovery.as_ref().map(config_json).transpose()?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::database(e, "Failed to begin transaction for authenticator enrollment")
        })?;

        let row = sqlx::query_as::<_, AuthenticatorRow>(&format!(
            "INSERT INTO authenticators (user_id, kind, config, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            AUTHENTICATOR_COLUMNS
        ))
        .bind(user_id)
        .bind(kind.as_str())
        .bind(&config)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let err = Error::database(e, "Failed to create authenticator");
            if err.is_unique_violation() {
                Error::conflict(
                    format!("Authenticator '{}' is already enrolled", kind),
                    "Authenticator",
                )
            } else {
                err
            }
        })?;

        if let Some(recovery) = recovery {
            sqlx::query(
                "INSERT OR IGNORE INTO authenticators (user_id, kind, config, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(user_id)
            .bind(AuthenticatorKind::Recovery.as_str())
            .bind(&recovery)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e, "Failed to create recovery codes"))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::database(e, "Failed to commit authenticator enrollment"))?;

        row.try_into()
    }

    #[instrument(skip(self), fields(user_id = %user_id, authenticator_id = %id), name = "db_delete_authenticator")]
    async fn delete_authenticator(
        &self,
        user_id: &UserId,
        id: &AuthenticatorId,
        remove_recovery: bool,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::database(e, "Failed to begin transaction for authenticator removal")
        })?;

        let result = sqlx::query("DELETE FROM authenticators WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database(e, format!("Failed to delete authenticator: {}", id)))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Authenticator", id.to_string()));
        }

        if remove_recovery {
            sqlx::query("DELETE FROM authenticators WHERE user_id = $1 AND kind = $2")
                .bind(user_id)
                .bind(AuthenticatorKind::Recovery.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database(e, "Failed to delete recovery codes"))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::database(e, "Failed to commit authenticator removal"))?;

        Ok(())
    }
}
