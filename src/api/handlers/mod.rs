//! HTTP request handlers organized by resource type

pub mod auth;
pub mod authenticators;
pub mod health;
pub mod organization_home;
pub mod organizations;

pub use auth::{login_handler, logout_handler};
pub use authenticators::{
    delete_authenticator_handler, enroll_authenticator_handler, list_authenticators_handler,
};
pub use health::health_handler;
pub use organization_home::organization_home_handler;
pub use organizations::{
    create_organization_handler, list_organizations_handler, update_organization_handler,
};
