//! Organization home page with the organization-wide 2FA gate.

use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::{info, instrument};

use crate::{
    api::{error::ApiError, routes::ApiState},
    auth::{models::AuthContext, organization::OrganizationHomeResponse},
};

/// Where anonymous visitors are sent.
pub const LOGIN_PATH: &str = "/auth/login/";

/// Where members without a second factor are sent to enroll one.
pub const TWO_FACTOR_SETUP_PATH: &str = "/settings/account/security/";

/// Render an organization's home page.
///
/// Members of an organization that requires 2FA are redirected to the
/// security settings until they enroll a non-backup authenticator.
/// Superusers may view any organization and skip the gate.
#[utoipa::path(
    get,
    path = "/organizations/{slug}/",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Organization home", body = OrganizationHomeResponse),
        (status = 302, description = "Login or 2FA enrollment required"),
        (status = 404, description = "Organization not found")
    ),
    tag = "organizations"
)]
#[instrument(skip(state, context), fields(org_slug = %slug))]
pub async fn organization_home_handler(
    State(state): State<ApiState>,
    context: Option<Extension<AuthContext>>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let Some(Extension(context)) = context else {
        return Ok(found(LOGIN_PATH));
    };

    let not_found = || ApiError::not_found(format!("Organization '{}' not found", slug));

    let organization =
        state.organizations.get_organization_by_slug(&slug).await?.ok_or_else(not_found)?;

    let membership = state.memberships.get_membership(&context.user_id, &organization.id).await?;
    if membership.is_none() && !context.is_superuser {
        return Err(not_found());
    }

    if organization.require_2fa
        && !context.is_superuser
        && !state.authenticators.has_two_factor(&context.user_id).await?
    {
        info!(
            user_id = %context.user_id,
            org_id = %organization.id,
            "redirecting member without 2FA to enrollment"
        );
        return Ok(found(TWO_FACTOR_SETUP_PATH));
    }

    let body = OrganizationHomeResponse {
        organization: organization.into(),
        role: membership.map(|m| m.role),
    };
    Ok(Json(body).into_response())
}

/// `302 Found` to a site path.
fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}
