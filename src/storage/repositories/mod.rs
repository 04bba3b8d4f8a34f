//! Repository modules for data access
//!
//! Each repository handles persistence for one resource type and is exposed as
//! an async trait with a SQLx implementation over the shared pool.

pub mod audit_log;
pub mod authenticator;
pub mod organization;
pub mod session;
pub mod user;

pub use audit_log::{AuditEvent, AuditLogEntry, AuditLogRepository};
pub use authenticator::{AuthenticatorRepository, SqlxAuthenticatorRepository};
pub use organization::{
    NewOrganization, OrgMembershipRepository, OrganizationFilter, OrganizationRepository,
    OrganizationSort, OrganizationUpdate, SqlxOrgMembershipRepository, SqlxOrganizationRepository,
};
pub use session::{SessionRecord, SessionRepository, SqlxSessionRepository};
pub use user::{NewUser, SqlxUserRepository, UserRepository};
