//! # Authentication and Organization Policy
//!
//! Users, login sessions, second-factor authenticators and the organization
//! model with its roles and slug rules.

pub mod authenticator;
pub mod hashing;
pub mod middleware;
pub mod models;
pub mod organization;
pub mod session;
pub mod user;

pub use authenticator::{Authenticator, AuthenticatorKind, AuthenticatorService};
pub use models::{AuthContext, AuthError};
pub use organization::{OrgRole, OrgStatus, Organization, OrganizationMembership};
pub use session::{SessionService, SESSION_COOKIE_NAME};
pub use user::User;
