use axum::{routing::get, Json, Router};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::auth::login_handler,
        crate::api::handlers::auth::logout_handler,
        crate::api::handlers::organizations::list_organizations_handler,
        crate::api::handlers::organizations::create_organization_handler,
        crate::api::handlers::organizations::update_organization_handler,
        crate::api::handlers::organization_home::organization_home_handler,
        crate::api::handlers::authenticators::list_authenticators_handler,
        crate::api::handlers::authenticators::enroll_authenticator_handler,
        crate::api::handlers::authenticators::delete_authenticator_handler,
    ),
    components(
        schemas(
            crate::api::error::ErrorBody,
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::auth::LoginResponseBody,
            crate::api::handlers::organizations::OrganizationListResponse,
            crate::auth::user::LoginRequest,
            crate::auth::organization::CreateOrganizationRequest,
            crate::auth::organization::UpdateOrganizationRequest,
            crate::auth::organization::OrganizationResponse,
            crate::auth::organization::OrganizationStatusResponse,
            crate::auth::organization::OwnedOrganizationResponse,
            crate::auth::organization::OrganizationHomeResponse,
            crate::auth::organization::OrgStatus,
            crate::auth::organization::OrgRole,
            crate::auth::authenticator::AuthenticatorKind,
            crate::auth::authenticator::AuthenticatorResponse,
            crate::auth::authenticator::EnrollmentResponse
        )
    ),
    tags(
        (name = "auth", description = "Session login and logout"),
        (name = "organizations", description = "Organization listing, creation and settings"),
        (name = "authenticators", description = "Second-factor enrollment for the current user"),
        (name = "health", description = "Liveness and database readiness")
    ),
    security(
        ("bearerAuth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "sessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                crate::auth::session::SESSION_COOKIE_NAME,
            ))),
        );
    }
}

/// Serves the OpenAPI document as JSON.
pub fn docs_router() -> Router {
    Router::new().route("/api/0/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
