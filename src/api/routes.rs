use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::auth::{
    authenticator::AuthenticatorService,
    middleware::{require_session, resolve_session},
    session::SessionService,
};
use crate::config::AppConfig;
use crate::request_span;
use crate::storage::{
    repositories::{
        AuditLogRepository, OrgMembershipRepository, OrganizationRepository,
        SqlxAuthenticatorRepository, SqlxOrgMembershipRepository, SqlxOrganizationRepository,
        SqlxSessionRepository, SqlxUserRepository, UserRepository,
    },
    DbPool,
};

use super::{
    docs,
    handlers::{
        create_organization_handler, delete_authenticator_handler, enroll_authenticator_handler,
        health_handler, list_authenticators_handler, list_organizations_handler, login_handler,
        logout_handler, organization_home_handler, update_organization_handler,
    },
    rate_limit::RateLimiter,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub memberships: Arc<dyn OrgMembershipRepository>,
    pub users: Arc<dyn UserRepository>,
    pub audit: AuditLogRepository,
    pub sessions: Arc<SessionService>,
    pub authenticators: AuthenticatorService,
    pub create_limiter: RateLimiter,
}

impl ApiState {
    /// Wire the SQLx repositories and services over `pool`.
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let organizations: Arc<dyn OrganizationRepository> =
            Arc::new(SqlxOrganizationRepository::new(pool.clone()));
        let memberships: Arc<dyn OrgMembershipRepository> =
            Arc::new(SqlxOrgMembershipRepository::new(pool.clone()));
        let users: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(pool.clone()));

        let sessions = Arc::new(SessionService::new(
            Arc::new(SqlxSessionRepository::new(pool.clone())),
            users.clone(),
            config.session.ttl(),
        ));
        let authenticators = AuthenticatorService::new(
            Arc::new(SqlxAuthenticatorRepository::new(pool.clone())),
            memberships.clone(),
        );
        let create_limiter = RateLimiter::per_hour(config.organizations.creations_per_hour);

        Self {
            audit: AuditLogRepository::new(pool.clone()),
            pool,
            config: Arc::new(config),
            organizations,
            memberships,
            users,
            sessions,
            authenticators,
            create_limiter,
        }
    }
}

pub fn build_router(state: ApiState) -> Router {
    let session_layer = middleware::from_fn_with_state(state.sessions.clone(), resolve_session);

    let secured_api = Router::new()
        .route(
            "/api/0/organizations/",
            get(list_organizations_handler).post(create_organization_handler),
        )
        .route("/api/0/organizations/{slug}/", put(update_organization_handler))
        .route("/api/0/auth/logout/", post(logout_handler))
        .route("/api/0/users/me/authenticators/", get(list_authenticators_handler))
        .route(
            "/api/0/users/me/authenticators/{interface}/enroll/",
            post(enroll_authenticator_handler),
        )
        .route("/api/0/users/me/authenticators/{interface}/", delete(delete_authenticator_handler))
        .route_layer(middleware::from_fn(require_session));

    let public = Router::new()
        .route("/api/0/auth/login/", post(login_handler))
        .route("/organizations/{slug}/", get(organization_home_handler))
        .route("/healthz", get(health_handler));

    secured_api
        .merge(public)
        .with_state(state)
        .merge(docs::docs_router())
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    request_span!(request.method(), request.uri().path())
                })
                .on_response(
                    DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis),
                ),
        )
}
