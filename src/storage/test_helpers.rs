//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` is a fresh in-memory SQLite database with all
//! migrations applied, so tests are fully isolated from each other.
//!
//! This module is only available in test builds (`#[cfg(test)]`).

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, DbPool};

/// A migrated in-memory database.
///
/// The pool holds a single connection; do not query through `pool` while a
/// transaction on it is still open.
pub struct TestDatabase {
    pub pool: DbPool,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let pool = create_pool(&DatabaseConfig::in_memory())
            .await
            .expect("create in-memory test database");
        Self { pool }
    }
}
