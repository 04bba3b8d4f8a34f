//! Second-factor authenticator management for the current user.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    auth::{
        authenticator::{AuthenticatorKind, AuthenticatorResponse, EnrollmentResponse},
        models::AuthContext,
    },
    domain::AuthenticatorId,
};

#[utoipa::path(
    get,
    path = "/api/0/users/me/authenticators/",
    responses(
        (status = 200, description = "Enrolled authenticators", body = [AuthenticatorResponse]),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = [])),
    tag = "authenticators"
)]
#[instrument(skip(state), fields(user_id = %context.user_id))]
pub async fn list_authenticators_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<Vec<AuthenticatorResponse>>, ApiError> {
    let authenticators = state.authenticators.list(&context.user_id).await?;
    Ok(Json(authenticators.into_iter().map(AuthenticatorResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/0/users/me/authenticators/{interface}/enroll/",
    params(("interface" = String, Path, description = "Authenticator kind: totp, u2f or sms")),
    responses(
        (status = 201, description = "Authenticator enrolled", body = EnrollmentResponse),
        (status = 400, description = "Unknown kind or recovery codes requested directly"),
        (status = 409, description = "Kind already enrolled")
    ),
    security(("bearerAuth" = [])),
    tag = "authenticators"
)]
#[instrument(skip(state), fields(user_id = %context.user_id))]
pub async fn enroll_authenticator_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    Path(kind): Path<String>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    let kind = AuthenticatorKind::from_str(&kind).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let (authenticator, recovery_codes) = state.authenticators.enroll(&context.user_id, kind).await?;

    Ok((
        StatusCode::CREATED,
        Json(EnrollmentResponse { authenticator: authenticator.into(), recovery_codes }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/0/users/me/authenticators/{interface}/",
    params(("interface" = String, Path, description = "Authenticator id")),
    responses(
        (status = 204, description = "Authenticator removed"),
        (status = 403, description = "Last authenticator of a member of a 2FA organization"),
        (status = 404, description = "Authenticator not found")
    ),
    security(("bearerAuth" = [])),
    tag = "authenticators"
)]
#[instrument(skip(state), fields(user_id = %context.user_id))]
pub async fn delete_authenticator_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = AuthenticatorId::from_str(&id)
        .map_err(|_| ApiError::not_found(format!("Authenticator '{}' not found", id)))?;

    state.authenticators.remove(&context.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
