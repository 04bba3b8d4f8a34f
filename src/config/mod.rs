//! # Configuration Management
//!
//! Environment-driven configuration for orgdesk. See [`settings`] for the
//! individual sections and the `ORGDESK_*` variables each one reads.

pub mod settings;

pub use settings::{
    AppConfig, DatabaseConfig, ObservabilityConfig, OrganizationConfig, ServerConfig,
    SessionConfig,
};
