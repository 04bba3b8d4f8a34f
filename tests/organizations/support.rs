#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use orgdesk::{
    api::{build_router, ApiState},
    auth::{hashing::hash_secret, AuthenticatorKind, OrgRole, Organization, User},
    config::{AppConfig, DatabaseConfig},
    storage::{
        create_pool,
        repositories::{
            AuthenticatorRepository, NewOrganization, NewUser, OrgMembershipRepository,
            OrganizationRepository, OrganizationUpdate, SqlxAuthenticatorRepository,
            UserRepository,
        },
        DbPool,
    },
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub state: ApiState,
    pub pool: DbPool,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn create_user(&self, email: &str) -> User {
        self.state
            .users
            .create_user(
                NewUser::new(email, email.split('@').next().unwrap_or(email))
                    .with_password_hash(hash_secret(PASSWORD).expect("hash password")),
            )
            .await
            .expect("create user")
    }

    pub async fn create_superuser(&self, email: &str) -> User {
        self.state
            .users
            .create_user(NewUser::new(email, "Admin").superuser())
            .await
            .expect("create superuser")
    }

    /// Open a session for `user` and return its token.
    pub async fn login(&self, user: &User) -> String {
        self.state.sessions.issue(user.clone()).await.expect("issue session").token
    }

    pub async fn create_organization(&self, owner: &User, name: &str, slug: &str) -> Organization {
        self.state
            .organizations
            .create_with_owner(
                NewOrganization { name: name.to_string(), slug: slug.to_string() },
                &owner.id,
            )
            .await
            .expect("create organization")
    }

    pub async fn add_member(&self, user: &User, organization: &Organization, role: OrgRole) {
        self.state
            .memberships
            .create_membership(&user.id, &organization.id, role)
            .await
            .expect("create membership");
    }

    pub async fn update_organization(&self, organization: &Organization, update: OrganizationUpdate) {
        self.state
            .organizations
            .update_organization(&organization.id, update)
            .await
            .expect("update organization");
    }

    pub async fn require_two_factor(&self, organization: &Organization) {
        self.update_organization(
            organization,
            OrganizationUpdate { require_2fa: Some(true), ..Default::default() },
        )
        .await;
    }

    pub async fn enroll(&self, user: &User, kind: AuthenticatorKind) {
        self.state.authenticators.enroll(&user.id, kind).await.expect("enroll authenticator");
    }

    /// Raw access to authenticator rows, bypassing enrollment rules.
    pub fn authenticator_repository(&self) -> SqlxAuthenticatorRepository {
        SqlxAuthenticatorRepository::new(self.pool.clone())
    }

    /// Delete every authenticator of `user` directly in storage.
    pub async fn wipe_authenticators(&self, user: &User) {
        let repo = self.authenticator_repository();
        for authenticator in repo.list_for_user(&user.id).await.expect("list authenticators") {
            repo.delete_authenticator(&user.id, &authenticator.id, false)
                .await
                .expect("delete authenticator");
        }
    }

    /// Store recovery codes without any other interface.
    pub async fn insert_recovery_codes(&self, user: &User) {
        self.authenticator_repository()
            .create_authenticator(&user.id, AuthenticatorKind::Recovery, json!({"codes": []}), None)
            .await
            .expect("insert recovery codes");
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::from_lookup(|_| None).expect("default config");
    config.database = DatabaseConfig::in_memory();
    config.organizations.creations_per_hour = 1000;
    config.session.secure_cookies = false;
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with<F>(configure: F) -> TestApp
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = test_config();
    configure(&mut config);

    let pool = create_pool(&config.database).await.expect("create sqlite pool");
    let state = ApiState::new(pool.clone(), config);
    TestApp { state, pool }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn get(app: &TestApp, path: &str, token: &str) -> Response {
    send_request(app, Method::GET, path, Some(token), None).await
}

pub async fn post(app: &TestApp, path: &str, token: &str, body: Value) -> Response {
    send_request(app, Method::POST, path, Some(token), Some(body)).await
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// Slugs of a plain organization listing, in response order.
pub async fn listed_slugs(response: Response) -> Vec<String> {
    let body: Vec<Value> = read_json(response).await;
    body.iter().map(|org| org["slug"].as_str().expect("slug").to_string()).collect()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}
