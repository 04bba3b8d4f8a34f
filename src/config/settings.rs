//! # Configuration Settings
//!
//! Defines the configuration structure for the orgdesk service. Every value can
//! be supplied through `ORGDESK_*` environment variables (a `.env` file is loaded
//! by the binary before configuration is read).

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// HTTP server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Organization policy configuration
    #[validate(nested)]
    pub organizations: OrganizationConfig,

    /// Session configuration
    #[validate(nested)]
    pub session: SessionConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            server: ServerConfig::from_lookup(&lookup)?,
            database: DatabaseConfig::from_lookup(&lookup)?,
            organizations: OrganizationConfig::from_lookup(&lookup)?,
            session: SessionConfig::from_lookup(&lookup)?,
            observability: ObservabilityConfig::from_lookup(&lookup),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        if !self.database.url.starts_with("sqlite:") {
            return Err(Error::config("Database URL must start with 'sqlite:'"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(Error::config("min_connections cannot be greater than max_connections"));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Bind address cannot be empty"))]
    pub bind_address: String,

    /// Server port
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServerConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_address: lookup("ORGDESK_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse_or("ORGDESK_PORT", lookup, defaults.port)?,
        })
    }

    /// Get the server bind address
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/orgdesk.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            url: lookup("ORGDESK_DATABASE_URL").unwrap_or(defaults.url),
            max_connections: parse_or(
                "ORGDESK_DB_MAX_CONNECTIONS",
                lookup,
                defaults.max_connections,
            )?,
            min_connections: parse_or(
                "ORGDESK_DB_MIN_CONNECTIONS",
                lookup,
                defaults.min_connections,
            )?,
            connect_timeout_seconds: parse_or(
                "ORGDESK_DB_CONNECT_TIMEOUT_SECONDS",
                lookup,
                defaults.connect_timeout_seconds,
            )?,
            auto_migrate: flag_or("ORGDESK_DB_AUTO_MIGRATE", lookup, defaults.auto_migrate),
        })
    }

    /// In-memory database with a single long-lived connection.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to exactly one connection.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_seconds: 5,
            auto_migrate: true,
        }
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Whether the URL points at an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Organization policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrganizationConfig {
    /// Terms of service URL. Together with `privacy_url` it makes `agreeTerms` mandatory.
    pub terms_url: Option<String>,

    /// Privacy policy URL
    pub privacy_url: Option<String>,

    /// Whether users may create organizations
    pub allow_create: bool,

    /// Organization creations allowed per user per hour
    #[validate(range(min = 1, message = "Creation rate limit must be at least 1 per hour"))]
    pub creations_per_hour: u32,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self { terms_url: None, privacy_url: None, allow_create: true, creations_per_hour: 5 }
    }
}

impl OrganizationConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            terms_url: non_empty("ORGDESK_TERMS_URL").or_else(|| non_empty("TERMS_URL")),
            privacy_url: non_empty("ORGDESK_PRIVACY_URL").or_else(|| non_empty("PRIVACY_URL")),
            allow_create: flag_or("ORGDESK_ALLOW_ORG_CREATE", lookup, defaults.allow_create),
            creations_per_hour: parse_or(
                "ORGDESK_ORG_CREATE_PER_HOUR",
                lookup,
                defaults.creations_per_hour,
            )?,
        })
    }

    /// Terms must be accepted only when both legal documents are configured.
    pub fn requires_terms_agreement(&self) -> bool {
        self.terms_url.is_some() && self.privacy_url.is_some()
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Session lifetime in hours
    #[validate(range(min = 1, max = 720, message = "Session TTL must be between 1 and 720 hours"))]
    pub ttl_hours: i64,

    /// Mark the session cookie `Secure` (HTTPS only)
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_hours: 24, secure_cookies: true }
    }
}

impl SessionConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            ttl_hours: parse_or("ORGDESK_SESSION_TTL_HOURS", lookup, defaults.ttl_hours)?,
            secure_cookies: flag_or("ORGDESK_SECURE_COOKIES", lookup, defaults.secure_cookies),
        })
    }

    /// Session lifetime as a chrono duration
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("ORGDESK_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: flag_or("ORGDESK_LOG_JSON", lookup, defaults.json_logging),
        }
    }

    /// Read logging settings straight from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::config(format!("Invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}

fn flag_or<F>(key: &str, lookup: &F, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
