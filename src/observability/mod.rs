//! # Observability
//!
//! Structured logging setup and span helpers shared by the HTTP layer.

pub mod logging;

pub use logging::{init_logging, log_config_info};
