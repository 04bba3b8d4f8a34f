//! Authentication request context and errors.

use thiserror::Error;

use crate::domain::UserId;
use crate::errors::Error;

/// Request-scoped authentication context derived from a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub is_superuser: bool,
    pub session_id: String,
}

impl AuthContext {
    pub fn new(user_id: UserId, email: String, is_superuser: bool, session_id: String) -> Self {
        Self { user_id, email, is_superuser, session_id }
    }
}

/// Errors returned by session resolution.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized: malformed session token")]
    MalformedToken,
    #[error("unauthorized: session not found")]
    SessionNotFound,
    #[error("unauthorized: session revoked")]
    SessionRevoked,
    #[error("unauthorized: session expired")]
    SessionExpired,
    #[error("unauthorized: invalid email or password")]
    InvalidCredentials,
    #[error("unauthorized: user is inactive")]
    InactiveUser,
    #[error(transparent)]
    Persistence(#[from] Error),
}
