//! # REST API
//!
//! Router, handlers, error rendering and request-level helpers for the
//! organization endpoints.

pub mod docs;
pub mod error;
pub mod handlers;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use routes::{build_router, ApiState};
pub use server::start_api_server;
