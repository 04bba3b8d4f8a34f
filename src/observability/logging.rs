//! # Structured Logging
//!
//! Installs the global `tracing` subscriber and provides the span macro used by
//! the HTTP trace layer.
//!
//! The filter is taken from `RUST_LOG` when present, otherwise from
//! [`ObservabilityConfig::log_level`]. JSON output is enabled with
//! `ORGDESK_LOG_JSON=true`.

use crate::config::{AppConfig, ObservabilityConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/api/0/organizations/");
/// let span = request_span!("POST", "/api/0/organizations/", user_id = 7);
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Build the env filter for the given config.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. A subscriber that is already installed
/// (integration tests, repeated CLI invocations) is left in place.
pub fn init_logging(config: &ObservabilityConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if result.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        server_address = %config.server.socket_address(),
        database_in_memory = config.database.is_in_memory(),
        org_create_enabled = config.organizations.allow_create,
        org_create_per_hour = config.organizations.creations_per_hour,
        terms_required = config.organizations.requires_terms_agreement(),
        session_ttl_hours = config.session.ttl_hours,
        "orgdesk configuration"
    );
}
