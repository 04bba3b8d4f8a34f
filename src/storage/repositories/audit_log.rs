//! Audit log repository for organization changes

use crate::domain::{OrgId, UserId};
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

/// Audit event descriptor.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: Option<UserId>,
    pub org_id: Option<OrgId>,
    pub event: String,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn organization(
        event: &str,
        actor: &UserId,
        org_id: &OrgId,
        data: serde_json::Value,
    ) -> Self {
        Self { actor: Some(*actor), org_id: Some(*org_id), event: event.to_string(), data }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor: Option<UserId>,
    pub org_id: Option<OrgId>,
    pub event: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct AuditLogRow {
    pub id: i64,
    pub actor_user_id: Option<i64>,
    pub org_id: Option<i64>,
    pub event: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLogEntry {
    type Error = Error;

    fn try_from(row: AuditLogRow) -> Result<Self> {
        let data = serde_json::from_str(&row.data)
            .map_err(|e| Error::validation(format!("Invalid audit data JSON: {}", e)))?;
        Ok(AuditLogEntry {
            id: row.id,
            actor: row.actor_user_id.map(UserId::new),
            org_id: row.org_id.map(OrgId::new),
            event: row.event,
            data,
            created_at: row.created_at,
        })
    }
}

/// Repository for audit log interactions.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record an audit event.
    #[instrument(skip(self, event), fields(event = %event.event), name = "db_record_audit_event")]
    pub async fn record(&self, event: AuditEvent) -> Result<()> {
        let data = serde_json::to_string(&event.data)
            .map_err(|e| Error::validation(format!("Invalid audit data JSON: {}", e)))?;

        sqlx::query(
            "INSERT INTO audit_log_entries (actor_user_id, org_id, event, data, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.actor)
        .bind(event.org_id)
        .bind(&event.event)
        .bind(data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to write audit event"))?;

        Ok(())
    }

    /// Entries for one organization, oldest first.
    #[instrument(skip(self), fields(org_id = %org_id), name = "db_list_audit_events")]
    pub async fn list_for_organization(&self, org_id: &OrgId) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT id, actor_user_id, org_id, event, data, created_at
             FROM audit_log_entries WHERE org_id = $1 ORDER BY id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database(e, format!("Failed to list audit events for {}", org_id)))?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}
