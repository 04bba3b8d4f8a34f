//! # Database Migration Management
//!
//! SQL migrations under `migrations/` are embedded into the binary and applied
//! on startup when `auto_migrate` is enabled, or explicitly through the
//! `migrate` CLI command.

use crate::errors::{Error, Result};
use crate::storage::DbPool;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::FromRow;
use tracing::{error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// An applied migration as recorded by sqlx.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub success: bool,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!(available = MIGRATOR.iter().count(), "Starting database migration process");

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Database migration failed");
        Error::database(sqlx::Error::from(e), "Failed to run database migrations")
    })?;

    info!("Database migrations are up to date");
    Ok(())
}

/// List migrations recorded as applied
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    sqlx::query_as::<_, MigrationInfo>(
        "SELECT version, description, success FROM _sqlx_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::database(e, "Failed to list applied migrations"))
}
