//! Axum middleware for session authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, field, warn};

use crate::api::error::ApiError;
use crate::auth::models::{AuthContext, AuthError};
use crate::auth::session::{SessionService, SESSION_COOKIE_NAME};

pub type SessionServiceState = Arc<SessionService>;

/// Attach an [`AuthContext`] to the request when it carries a valid session.
///
/// Requests without a usable session continue anonymously; routes that need a
/// user sit behind [`require_session`].
pub async fn resolve_session(
    State(sessions): State<SessionServiceState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = session_token(request.headers()) else {
        return Ok(next.run(request).await);
    };

    match sessions.validate(&token).await {
        Ok(context) => {
            tracing::Span::current().record("user_id", field::display(&context.user_id));
            request.extensions_mut().insert(context);
        }
        Err(err @ AuthError::Persistence(_)) => {
            warn!(error = %err, "session lookup failed");
            return Err(err.into());
        }
        Err(err) => {
            debug!(error = %err, "ignoring unusable session");
        }
    }

    Ok(next.run(request).await)
}

/// Reject requests that did not resolve to a user.
pub async fn require_session(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<AuthContext>().is_none() {
        return Err(ApiError::unauthorized("Authentication credentials were not provided."));
    }
    Ok(next.run(request).await)
}

/// Session token from `Authorization: Bearer` or the session cookie, in that order.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}
