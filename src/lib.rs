//! # orgdesk
//!
//! Organization management service: listing the organizations a user belongs
//! to or owns, creating organizations with unique slugs, and enforcing
//! organization-wide two-factor authentication.
//!
//! ## Architecture
//!
//! ```text
//! REST API (axum) → session middleware → handlers → repositories → SQLite (sqlx)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use orgdesk::{api::{build_router, ApiState}, config::AppConfig, storage::create_pool};
//!
//! # async fn run() -> orgdesk::Result<()> {
//! let config = AppConfig::from_env()?;
//! let pool = create_pool(&config.database).await?;
//! let router = build_router(ApiState::new(pool, config));
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
