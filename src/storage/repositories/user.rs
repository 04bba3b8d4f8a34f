//! User repository for account management and credential lookup

use crate::auth::user::User;
use crate::domain::UserId;
use crate::errors::{Error, Result};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

// Database row structures

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            email: row.email,
            name: row.name,
            is_superuser: row.is_superuser,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_superuser, is_active, created_at";

/// Values for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    /// Argon2 PHC string; `None` creates an account that cannot log in with a password
    pub password_hash: Option<String>,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self { email: email.into(), name: name.into(), password_hash: None, is_superuser: false }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }
}

// Repository traits

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get a user by ID
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user with their password hash for authentication
    async fn get_user_with_password(&self, email: &str)
        -> Result<Option<(User, Option<String>)>>;

    /// Activate or deactivate an account
    async fn set_active(&self, id: &UserId, active: bool) -> Result<()>;
}

// SQLx implementations

#[derive(Debug, Clone)]
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    #[instrument(skip(self, user), fields(user_email = %user.email), name = "db_create_user")]
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let email = User::normalize_email(&user.email);

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, name, password_hash, is_superuser, is_active, created_at)
             VALUES ($1, $2, $3, $4, TRUE, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(&user.name)
        .bind(user.password_hash.as_deref())
        .bind(user.is_superuser)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = Error::database(e, "Failed to create user");
            if err.is_unique_violation() {
                Error::conflict(format!("A user with email '{}' already exists", email), "User")
            } else {
                err
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(user_id = %id), name = "db_get_user")]
    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let row =
            sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::database(e, format!("Failed to fetch user by ID: {}", id)))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), name = "db_get_user_with_password")]
    async fn get_user_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, Option<String>)>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = $1",
            USER_COLUMNS
        ))
        .bind(User::normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e, "Failed to fetch user for authentication"))?;

        Ok(row.map(|r| {
            let hash = r.password_hash.clone();
            (r.into(), hash)
        }))
    }

    #[instrument(skip(self), fields(user_id = %id, active = active), name = "db_set_user_active")]
    async fn set_active(&self, id: &UserId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e, format!("Failed to update user: {}", id)))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("User", id.to_string()));
        }
        Ok(())
    }
}
