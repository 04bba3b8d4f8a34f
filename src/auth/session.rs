//! Session-based authentication.
//!
//! A successful login issues an opaque token `od_session_{id}.{secret}`. The
//! id locates the stored session and the secret is verified against its
//! argon2 hash. Browsers carry the token in the `orgdesk_session` cookie;
//! API clients may send it as a bearer token instead.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use tracing::{info, instrument, warn};

use crate::auth::hashing::{hash_secret, verify_secret};
use crate::auth::models::{AuthContext, AuthError};
use crate::auth::user::User;
use crate::storage::repositories::{SessionRepository, UserRepository};

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "orgdesk_session";

const SESSION_TOKEN_PREFIX: &str = "od_session_";
const SESSION_SECRET_BYTES: usize = 32;

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Issues, validates and revokes login sessions.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    ttl: chrono::Duration,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        ttl: chrono::Duration,
    ) -> Self {
        Self { sessions, users, ttl }
    }

    /// Check credentials and open a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let (user, password_hash) =
            self.users.get_user_with_password(email).await?.ok_or(AuthError::InvalidCredentials)?;

        let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;
        if !verify_secret(&password_hash, password)? {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login rejected: inactive user");
            return Err(AuthError::InactiveUser);
        }

        self.issue(user).await
    }

    /// Open a session for an already authenticated user.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue(&self, user: User) -> Result<IssuedSession, AuthError> {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let secret = generate_secret();
        let secret_hash = hash_secret(&secret)?;
        let expires_at = Utc::now() + self.ttl;

        self.sessions.create_session(&session_id, &user.id, &secret_hash, expires_at).await?;

        info!(user_id = %user.id, session_id = %session_id, "session created");

        Ok(IssuedSession {
            token: format!("{}{}.{}", SESSION_TOKEN_PREFIX, session_id, secret),
            session_id,
            expires_at,
            user,
        })
    }

    /// Resolve a session token into an [`AuthContext`].
    #[instrument(skip(self, token))]
    pub async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let (session_id, secret) = parse_session_token(token)?;

        let session =
            self.sessions.get_session(session_id).await?.ok_or(AuthError::SessionNotFound)?;

        if session.revoked {
            return Err(AuthError::SessionRevoked);
        }
        if session.expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }
        if !verify_secret(&session.secret_hash, secret)? {
            return Err(AuthError::SessionNotFound);
        }

        let user = self.users.get_user(&session.user_id).await?.ok_or(AuthError::SessionNotFound)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(AuthContext::new(user.id, user.email, user.is_superuser, session.id))
    }

    /// Revoke a session by id.
    #[instrument(skip(self))]
    pub async fn revoke(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.revoke_session(session_id).await?;
        info!(session_id = %session_id, "session revoked");
        Ok(())
    }
}

/// Build the HTTP-only session cookie.
pub fn build_session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .expires(time::OffsetDateTime::from_unix_timestamp(expires_at.timestamp()).ok())
        .build()
}

/// Cookie that makes the browser forget the session.
pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

fn parse_session_token(token: &str) -> Result<(&str, &str), AuthError> {
    let rest = token.strip_prefix(SESSION_TOKEN_PREFIX).ok_or(AuthError::MalformedToken)?;
    let (id, secret) = rest.split_once('.').ok_or(AuthError::MalformedToken)?;
    if id.is_empty() || secret.is_empty() || secret.contains('.') {
        return Err(AuthError::MalformedToken);
    }
    Ok((id, secret))
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SESSION_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
