//! Session login and logout handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::Cookie;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::{error::ApiError, routes::ApiState},
    auth::{
        models::AuthContext,
        session::{build_session_cookie, expired_session_cookie},
        user::LoginRequest,
    },
    domain::UserId,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseBody {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub is_superuser: bool,
    /// Opaque session token, usable as a bearer token
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JSON body plus the `Set-Cookie` header.
pub struct LoginResponse {
    body: LoginResponseBody,
    cookie: Cookie<'static>,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, Json(self.body)).into_response();
        if let Ok(cookie_value) = self.cookie.to_string().parse() {
            response.headers_mut().insert(header::SET_COOKIE, cookie_value);
        }
        response
    }
}

#[utoipa::path(
    post,
    path = "/api/0/auth/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponseBody,
         headers(("Set-Cookie" = String, description = "Session cookie (orgdesk_session)"))
        ),
        (status = 400, description = "Malformed credentials"),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn login_handler(
    State(state): State<ApiState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<LoginResponse, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let issued = state.sessions.login(&payload.email, &payload.password).await?;
    let cookie =
        build_session_cookie(&issued.token, issued.expires_at, state.config.session.secure_cookies);

    info!(user_id = %issued.user.id, "user logged in");

    Ok(LoginResponse {
        body: LoginResponseBody {
            user_id: issued.user.id,
            email: issued.user.email,
            name: issued.user.name,
            is_superuser: issued.user.is_superuser,
            token: issued.token,
            expires_at: issued.expires_at,
        },
        cookie,
    })
}

#[utoipa::path(
    post,
    path = "/api/0/auth/logout/",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = [])),
    tag = "auth"
)]
#[instrument(skip(state), fields(user_id = %context.user_id))]
pub async fn logout_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    state.sessions.revoke(&context.session_id).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    let cleared = expired_session_cookie(state.config.session.secure_cookies);
    if let Ok(cookie_value) = cleared.to_string().parse() {
        response.headers_mut().insert(header::SET_COOKIE, cookie_value);
    }
    Ok(response)
}
