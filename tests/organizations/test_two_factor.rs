use axum::http::{Method, StatusCode};
use orgdesk::auth::{AuthenticatorKind, OrgRole};
use orgdesk::storage::repositories::OrganizationRepository;
use serde_json::{json, Value};

use crate::support::{get, location, read_json, send_request, setup_test_app, TestApp};

const SETUP_PATH: &str = "/settings/account/security/";

async fn home_status(app: &TestApp, slug: &str, token: &str) -> (StatusCode, Option<String>) {
    let response = get(app, &format!("/organizations/{}/", slug), token).await;
    let status = response.status();
    let target = (status == StatusCode::FOUND).then(|| location(&response).to_string());
    (status, target)
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    app.create_organization(&owner, "Acme", "acme").await;

    let response = send_request(&app, Method::GET, "/organizations/acme/", None, None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/auth/login/");
}

#[tokio::test]
async fn members_view_home_without_requirement() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    app.create_organization(&owner, "Acme", "acme").await;

    let token = app.login(&owner).await;
    let response = get(&app, "/organizations/acme/", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["slug"], "acme");
    assert_eq!(body["role"], "owner");
}

#[tokio::test]
async fn existing_member_is_gated_until_enrolled() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let member = app.create_user("member@example.com").await;
    let org = app.create_organization(&owner, "Acme", "acme").await;
    app.add_member(&member, &org, OrgRole::Member).await;
    app.require_two_factor(&org).await;

    let token = app.login(&member).await;
    assert_eq!(
        home_status(&app, "acme", &token).await,
        (StatusCode::FOUND, Some(SETUP_PATH.to_string()))
    );

    app.enroll(&member, AuthenticatorKind::Totp).await;
    assert_eq!(home_status(&app, "acme", &token).await, (StatusCode::OK, None));

    app.wipe_authenticators(&member).await;
    assert_eq!(
        home_status(&app, "acme", &token).await,
        (StatusCode::FOUND, Some(SETUP_PATH.to_string()))
    );
}

#[tokio::test]
async fn newly_added_member_is_gated_until_enrolled() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let org = app.create_organization(&owner, "Acme", "acme").await;
    app.require_two_factor(&org).await;

    let newcomer = app.create_user("new@example.com").await;
    app.add_member(&newcomer, &org, OrgRole::Admin).await;
    let token = app.login(&newcomer).await;

    assert_eq!(home_status(&app, "acme", &token).await.0, StatusCode::FOUND);

    app.enroll(&newcomer, AuthenticatorKind::U2f).await;
    assert_eq!(home_status(&app, "acme", &token).await.0, StatusCode::OK);

    app.wipe_authenticators(&newcomer).await;
    assert_eq!(home_status(&app, "acme", &token).await.0, StatusCode::FOUND);
}

#[tokio::test]
async fn recovery_codes_alone_do_not_pass_the_gate() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let member = app.create_user("member@example.com").await;
    let org = app.create_organization(&owner, "Acme", "acme").await;
    app.add_member(&member, &org, OrgRole::Member).await;
    app.require_two_factor(&org).await;
    app.insert_recovery_codes(&member).await;

    let token = app.login(&member).await;
    assert_eq!(home_status(&app, "acme", &token).await.0, StatusCode::FOUND);
}

#[tokio::test]
async fn outsiders_and_unknown_slugs_get_not_found() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let outsider = app.create_user("outsider@example.com").await;
    app.create_organization(&owner, "Acme", "acme").await;

    let token = app.login(&outsider).await;
    assert_eq!(home_status(&app, "acme", &token).await.0, StatusCode::NOT_FOUND);

    let owner_token = app.login(&owner).await;
    assert_eq!(home_status(&app, "missing", &owner_token).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn superusers_skip_membership_and_gate() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let root = app.create_superuser("root@example.com").await;
    let org = app.create_organization(&owner, "Acme", "acme").await;
    app.require_two_factor(&org).await;

    let token = app.login(&root).await;
    let response = get(&app, "/organizations/acme/", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert!(body["role"].is_null());
    assert_eq!(body["require2FA"], true);
}

#[tokio::test]
async fn enabling_requirement_needs_personal_two_factor() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    app.create_organization(&owner, "Acme", "acme").await;
    let token = app.login(&owner).await;

    let body = json!({"require2FA": true});
    let refused = send_request(
        &app,
        Method::PUT,
        "/api/0/organizations/acme/",
        Some(&token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(refused.status(), StatusCode::BAD_REQUEST);

    app.enroll(&owner, AuthenticatorKind::Totp).await;
    let accepted =
        send_request(&app, Method::PUT, "/api/0/organizations/acme/", Some(&token), Some(body))
            .await;
    assert_eq!(accepted.status(), StatusCode::OK);
    let updated: Value = read_json(accepted).await;
    assert_eq!(updated["require2FA"], true);

    let org = app.state.organizations.get_organization_by_slug("acme").await.unwrap().unwrap();
    let audit = app.state.audit.list_for_organization(&org.id).await.unwrap();
    assert!(audit.iter().any(|entry| entry.event == "organization.edit"));
}

#[tokio::test]
async fn only_owners_and_managers_change_settings() {
    let app = setup_test_app().await;
    let owner = app.create_user("owner@example.com").await;
    let member = app.create_user("member@example.com").await;
    let manager = app.create_user("manager@example.com").await;
    let outsider = app.create_user("outsider@example.com").await;
    let org = app.create_organization(&owner, "Acme", "acme").await;
    app.add_member(&member, &org, OrgRole::Member).await;
    app.add_member(&manager, &org, OrgRole::Manager).await;

    let rename = json!({"name": "Acme Renamed"});
    let path = "/api/0/organizations/acme/";

    let member_token = app.login(&member).await;
    let response =
        send_request(&app, Method::PUT, path, Some(&member_token), Some(rename.clone())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let outsider_token = app.login(&outsider).await;
    let response =
        send_request(&app, Method::PUT, path, Some(&outsider_token), Some(rename.clone())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let manager_token = app.login(&manager).await;
    let response = send_request(&app, Method::PUT, path, Some(&manager_token), Some(rename)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = read_json(response).await;
    assert_eq!(body["name"], "Acme Renamed");
}
