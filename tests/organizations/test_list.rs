use axum::http::{Method, StatusCode};
use orgdesk::auth::{OrgRole, OrgStatus};
use orgdesk::storage::repositories::OrganizationUpdate;
use serde_json::Value;

use crate::support::{get, listed_slugs, read_json, send_request, setup_test_app};

#[tokio::test]
async fn member_listing_returns_every_membership() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;

    app.create_organization(&alice, "Alpha", "alpha").await;
    let beta = app.create_organization(&bob, "Beta", "beta").await;
    let gamma = app.create_organization(&bob, "Gamma", "gamma").await;
    app.create_organization(&bob, "Delta", "delta").await;
    app.add_member(&alice, &beta, OrgRole::Member).await;
    app.add_member(&alice, &gamma, OrgRole::Admin).await;

    let token = app.login(&alice).await;
    let response = get(&app, "/api/0/organizations/?member=1", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut slugs = listed_slugs(response).await;
    slugs.sort();
    assert_eq!(slugs, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn default_listing_is_newest_first() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    app.create_organization(&alice, "First", "first").await;
    app.create_organization(&alice, "Second", "second").await;

    let token = app.login(&alice).await;
    let slugs = listed_slugs(get(&app, "/api/0/organizations/", &token).await).await;
    assert_eq!(slugs, vec!["second", "first"]);
}

#[tokio::test]
async fn entries_have_wire_shape() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let org = app.create_organization(&alice, "Acme Corp", "acme").await;

    let token = app.login(&alice).await;
    let body: Vec<Value> = read_json(get(&app, "/api/0/organizations/", &token).await).await;
    assert_eq!(body.len(), 1);
    let entry = &body[0];
    assert_eq!(entry["id"], org.id.to_string());
    assert_eq!(entry["name"], "Acme Corp");
    assert_eq!(entry["slug"], "acme");
    assert_eq!(entry["status"]["id"], "active");
    assert_eq!(entry["status"]["name"], "active");
    assert_eq!(entry["require2FA"], false);
    assert!(entry["dateCreated"].is_string());
}

#[tokio::test]
async fn owner_listing_reports_single_owner() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;

    app.create_organization(&alice, "Solo", "solo").await;
    let shared = app.create_organization(&alice, "Shared", "shared").await;
    app.add_member(&bob, &shared, OrgRole::Owner).await;
    let foreign = app.create_organization(&bob, "Foreign", "foreign").await;
    app.add_member(&alice, &foreign, OrgRole::Manager).await;

    let token = app.login(&alice).await;
    let response = get(&app, "/api/0/organizations/?owner=1", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Vec<Value> = read_json(response).await;
    let entries: Vec<(String, bool)> = body
        .iter()
        .map(|entry| {
            (
                entry["organization"]["slug"].as_str().unwrap().to_string(),
                entry["singleOwner"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(entries, vec![("solo".to_string(), true), ("shared".to_string(), false)]);
}

#[tokio::test]
async fn owner_listing_skips_organizations_pending_deletion() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    app.create_organization(&alice, "Keep", "keep").await;
    let doomed = app.create_organization(&alice, "Doomed", "doomed").await;
    app.update_organization(
        &doomed,
        OrganizationUpdate { status: Some(OrgStatus::PendingDeletion), ..Default::default() },
    )
    .await;

    let token = app.login(&alice).await;
    let body: Vec<Value> = read_json(get(&app, "/api/0/organizations/?owner=1", &token).await).await;
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["organization"]["slug"], "keep");
}

#[tokio::test]
async fn status_query_filters_and_tolerates_unknown_values() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    app.create_organization(&alice, "Live", "live").await;
    let leaving = app.create_organization(&alice, "Leaving", "leaving").await;
    app.update_organization(
        &leaving,
        OrganizationUpdate { status: Some(OrgStatus::PendingDeletion), ..Default::default() },
    )
    .await;

    let token = app.login(&alice).await;

    let active = listed_slugs(get(&app, "/api/0/organizations/?query=status:active", &token).await)
        .await;
    assert_eq!(active, vec!["live"]);

    let pending = listed_slugs(
        get(&app, "/api/0/organizations/?query=status:pending_deletion", &token).await,
    )
    .await;
    assert_eq!(pending, vec!["leaving"]);

    let response = get(&app, "/api/0/organizations/?query=status:bogus", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(listed_slugs(response).await.is_empty());
}

#[tokio::test]
async fn slug_id_and_text_queries() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let acme = app.create_organization(&alice, "Acme Widgets", "acme").await;
    app.create_organization(&alice, "Globex", "globex").await;

    let token = app.login(&alice).await;

    let by_slug = listed_slugs(get(&app, "/api/0/organizations/?query=slug:globex", &token).await)
        .await;
    assert_eq!(by_slug, vec!["globex"]);

    let by_id = listed_slugs(
        get(&app, &format!("/api/0/organizations/?query=id:{}", acme.id), &token).await,
    )
    .await;
    assert_eq!(by_id, vec!["acme"]);

    let by_text = listed_slugs(get(&app, "/api/0/organizations/?query=widg", &token).await).await;
    assert_eq!(by_text, vec!["acme"]);

    let unknown_key =
        listed_slugs(get(&app, "/api/0/organizations/?query=color:blue", &token).await).await;
    assert!(unknown_key.is_empty());
}

#[tokio::test]
async fn email_query_matches_member_email() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;
    let shared = app.create_organization(&alice, "Shared", "shared").await;
    app.add_member(&bob, &shared, OrgRole::Member).await;
    app.create_organization(&alice, "Private", "private").await;

    let token = app.login(&alice).await;
    let slugs = listed_slugs(
        get(&app, "/api/0/organizations/?query=email:Bob@Example.com", &token).await,
    )
    .await;
    assert_eq!(slugs, vec!["shared"]);
}

#[tokio::test]
async fn sort_by_members() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;
    let big = app.create_organization(&alice, "Big", "big").await;
    app.add_member(&bob, &big, OrgRole::Member).await;
    app.create_organization(&alice, "Small", "small").await;

    let token = app.login(&alice).await;
    let slugs =
        listed_slugs(get(&app, "/api/0/organizations/?sortBy=members", &token).await).await;
    assert_eq!(slugs, vec!["big", "small"]);
}

#[tokio::test]
async fn non_members_do_not_see_organizations() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let mallory = app.create_user("mallory@example.com").await;
    app.create_organization(&alice, "Alpha", "alpha").await;

    let token = app.login(&mallory).await;
    let slugs = listed_slugs(get(&app, "/api/0/organizations/?show=all", &token).await).await;
    assert!(slugs.is_empty());
}

#[tokio::test]
async fn superusers_see_everything_with_show_all() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let root = app.create_superuser("root@example.com").await;
    app.create_organization(&alice, "Alpha", "alpha").await;

    let token = app.login(&root).await;
    assert!(listed_slugs(get(&app, "/api/0/organizations/", &token).await).await.is_empty());

    let all = listed_slugs(get(&app, "/api/0/organizations/?show=all", &token).await).await;
    assert_eq!(all, vec!["alpha"]);
}

#[tokio::test]
async fn listing_requires_authentication() {
    let app = setup_test_app().await;
    let response = send_request(&app, Method::GET, "/api/0/organizations/", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response =
        send_request(&app, Method::GET, "/api/0/organizations/", Some("od_session_x.y"), None)
            .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
