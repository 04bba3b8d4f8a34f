//! Organization API handlers.
//!
//! Listing supports the `member`, `owner`, `show`, `sortBy` and `query`
//! parameters. Creation derives a unique slug from the name when none is
//! given and makes the caller the owner.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::{
        error::ApiError,
        query::{apply_organization_query, QueryMatch},
        routes::ApiState,
    },
    auth::{
        models::AuthContext,
        organization::{
            is_reserved_slug, slug_candidate, slugify, validate_slug, CreateOrganizationRequest,
            Organization, OrganizationResponse, OwnedOrganizationResponse,
            UpdateOrganizationRequest, FALLBACK_SLUG,
        },
    },
    errors::Error,
    storage::repositories::{
        AuditEvent, NewOrganization, OrganizationFilter, OrganizationSort, OrganizationUpdate,
    },
};

/// Upper bound on derived slug candidates tried before giving up.
const MAX_SLUG_ATTEMPTS: usize = 20;

/// Query parameters of the organization listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListOrganizationsQuery {
    /// `1` restricts the list to organizations the caller belongs to
    pub member: Option<String>,
    /// `1` lists organizations the caller owns, with owner counts
    pub owner: Option<String>,
    /// Search query, e.g. `status:active slug:acme`
    pub query: Option<String>,
    /// `all` lets superusers list every organization
    pub show: Option<String>,
    /// `members` sorts by member count
    pub sort_by: Option<String>,
}

/// Body of the organization listing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum OrganizationListResponse {
    Organizations(Vec<OrganizationResponse>),
    Owned(Vec<OwnedOrganizationResponse>),
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// List organizations visible to the caller.
#[utoipa::path(
    get,
    path = "/api/0/organizations/",
    params(ListOrganizationsQuery),
    responses(
        (status = 200, description = "Organizations listed", body = OrganizationListResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = [])),
    tag = "organizations"
)]
#[instrument(skip(state, params), fields(user_id = %context.user_id))]
pub async fn list_organizations_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    Query(params): Query<ListOrganizationsQuery>,
) -> Result<Json<OrganizationListResponse>, ApiError> {
    if is_truthy(params.owner.as_deref()) {
        let owned = state.organizations.list_owned_organizations(&context.user_id).await?;
        return Ok(Json(OrganizationListResponse::Owned(
            owned.into_iter().map(OwnedOrganizationResponse::from).collect(),
        )));
    }

    let show_all = params.show.as_deref() == Some("all") && context.is_superuser;
    let mut filter = OrganizationFilter::default();
    if is_truthy(params.member.as_deref()) || !show_all {
        filter.member_of = Some(context.user_id);
    }
    if params.sort_by.as_deref() == Some("members") {
        filter.sort = OrganizationSort::Members;
    }

    if let Some(query) = params.query.as_deref() {
        if apply_organization_query(query, &mut filter) == QueryMatch::Nothing {
            return Ok(Json(OrganizationListResponse::Organizations(Vec::new())));
        }
    }

    let organizations = state.organizations.list_organizations(&filter).await?;
    Ok(Json(OrganizationListResponse::Organizations(
        organizations.into_iter().map(OrganizationResponse::from).collect(),
    )))
}

/// Create an organization owned by the caller.
#[utoipa::path(
    post,
    path = "/api/0/organizations/",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Validation error or terms not accepted"),
        (status = 401, description = "Not authenticated or creation disabled"),
        (status = 409, description = "Slug already in use"),
        (status = 429, description = "Too many organizations created recently")
    ),
    security(("bearerAuth" = [])),
    tag = "organizations"
)]
#[instrument(skip(state, payload), fields(user_id = %context.user_id))]
pub async fn create_organization_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    payload: Result<Json<CreateOrganizationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrganizationResponse>), ApiError> {
    let settings = &state.config.organizations;
    if !settings.allow_create {
        return Err(ApiError::unauthorized("Organization creation is currently disabled"));
    }

    state.create_limiter.check_rate_limit(&format!("user:{}", context.user_id)).await.map_err(
        |retry_after| {
            warn!(user_id = %context.user_id, "organization creation rate limited");
            ApiError::too_many_requests(
                "You are attempting to create too many organizations too quickly",
                retry_after,
            )
        },
    )?;

    let Json(payload) = payload?;
    payload.validate()?;

    if settings.requires_terms_agreement() && !payload.agree_terms {
        return Err(ApiError::bad_request(
            "You must agree to the Terms of Service and Privacy Policy",
        ));
    }

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name: This field is required"));
    }

    let organization = match payload.slug.as_deref() {
        Some(slug) => {
            validate_slug(slug)?;
            state
                .organizations
                .create_with_owner(
                    NewOrganization { name: name.clone(), slug: slug.to_string() },
                    &context.user_id,
                )
                .await?
        }
        None => create_with_derived_slug(&state, &name, &context).await?,
    };

    info!(
        org_id = %organization.id,
        org_slug = %organization.slug,
        user_id = %context.user_id,
        agree_terms = payload.agree_terms,
        "organization created"
    );

    record_audit(
        &state,
        AuditEvent::organization(
            "organization.create",
            &context.user_id,
            &organization.id,
            json!({
                "name": organization.name,
                "slug": organization.slug,
                "agreeTerms": payload.agree_terms,
            }),
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(organization.into())))
}

async fn create_with_derived_slug(
    state: &ApiState,
    name: &str,
    context: &AuthContext,
) -> Result<Organization, ApiError> {
    let mut base = slugify(name);
    if base.is_empty() {
        base = FALLBACK_SLUG.to_string();
    }

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = slug_candidate(&base, attempt);
        if is_reserved_slug(&candidate) || !state.organizations.is_slug_available(&candidate).await?
        {
            continue;
        }

        let new = NewOrganization { name: name.to_string(), slug: candidate };
        match state.organizations.create_with_owner(new, &context.user_id).await {
            Ok(organization) => return Ok(organization),
            // Taken between the availability check and the insert.
            Err(Error::Conflict { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::Conflict(format!("Could not find a free slug for '{}'", base)))
}

/// Change an organization's name or its 2FA requirement.
#[utoipa::path(
    put,
    path = "/api/0/organizations/{slug}/",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = OrganizationResponse),
        (status = 400, description = "Validation error or caller lacks 2FA"),
        (status = 403, description = "Caller is not an owner or manager"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearerAuth" = [])),
    tag = "organizations"
)]
#[instrument(skip(state, payload), fields(user_id = %context.user_id, org_slug = %slug))]
pub async fn update_organization_handler(
    State(state): State<ApiState>,
    Extension(context): Extension<AuthContext>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateOrganizationRequest>, JsonRejection>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let organization = state
        .organizations
        .get_organization_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Organization '{}' not found", slug)))?;

    let membership = state.memberships.get_membership(&context.user_id, &organization.id).await?;
    match membership {
        Some(m) if m.role.can_change_settings() => {}
        Some(_) if context.is_superuser => {}
        Some(_) => {
            return Err(ApiError::forbidden(
                "You do not have permission to change this organization's settings",
            ))
        }
        None if context.is_superuser => {}
        None => return Err(ApiError::not_found(format!("Organization '{}' not found", slug))),
    }

    let enabling_2fa = payload.require_2fa == Some(true) && !organization.require_2fa;
    if enabling_2fa && !state.authenticators.has_two_factor(&context.user_id).await? {
        return Err(ApiError::bad_request(
            "Cannot require two-factor authentication without personal two-factor enabled",
        ));
    }

    let update = OrganizationUpdate {
        name: payload.name.as_deref().map(str::trim).map(str::to_string),
        require_2fa: payload.require_2fa,
        status: None,
    };
    let updated = state.organizations.update_organization(&organization.id, update).await?;

    if updated.require_2fa != organization.require_2fa {
        info!(
            org_id = %updated.id,
            require_2fa = updated.require_2fa,
            user_id = %context.user_id,
            "organization 2FA requirement changed"
        );
    }

    record_audit(
        &state,
        AuditEvent::organization(
            "organization.edit",
            &context.user_id,
            &updated.id,
            json!({
                "name": updated.name,
                "require2FA": updated.require_2fa,
                "previousRequire2FA": organization.require_2fa,
            }),
        ),
    )
    .await;

    Ok(Json(updated.into()))
}

/// Audit failures are logged, never surfaced to the caller.
async fn record_audit(state: &ApiState, event: AuditEvent) {
    let name = event.event.clone();
    if let Err(err) = state.audit.record(event).await {
        warn!(event = %name, error = %err, "failed to write audit entry");
    }
}
