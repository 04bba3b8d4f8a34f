//! Domain layer
//!
//! Strongly typed identifiers shared by the storage and API layers.

pub mod id;

pub use id::{AuthenticatorId, OrgId, UserId};
