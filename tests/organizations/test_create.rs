use axum::http::{header::RETRY_AFTER, Method, StatusCode};
use orgdesk::storage::repositories::OrganizationRepository;
use serde_json::{json, Value};

use crate::support::{post, read_json, send_request, setup_test_app, setup_test_app_with};

const PATH: &str = "/api/0/organizations/";

#[tokio::test]
async fn derives_slug_from_name() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let response = post(&app, PATH, &token, json!({"name": "hello world"})).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = read_json(response).await;
    assert_eq!(body["name"], "hello world");
    assert_eq!(body["slug"], "hello-world");
    assert!(body["id"].is_string());

    let stored = app.state.organizations.get_organization_by_slug("hello-world").await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn derived_slugs_stay_unique() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let mut slugs = Vec::new();
    for _ in 0..3 {
        let response = post(&app, PATH, &token, json!({"name": "Hello World"})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = read_json(response).await;
        slugs.push(body["slug"].as_str().unwrap().to_string());
    }
    assert_eq!(slugs, vec!["hello-world", "hello-world-2", "hello-world-3"]);
}

#[tokio::test]
async fn derived_slug_skips_reserved_words_and_empty_names() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let body: Value = read_json(post(&app, PATH, &token, json!({"name": "Admin"})).await).await;
    assert_eq!(body["slug"], "admin-2");

    let body: Value = read_json(post(&app, PATH, &token, json!({"name": "!!!"})).await).await;
    assert_eq!(body["slug"], "organization");
}

#[tokio::test]
async fn duplicate_name_and_slug_conflicts() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let payload = json!({"name": "hello world", "slug": "foobar"});
    let first = post(&app, PATH, &token, payload.clone()).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = post(&app, PATH, &token, payload).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = read_json(second).await;
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn missing_or_malformed_body_is_rejected() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let empty = post(&app, PATH, &token, json!({})).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let blank = post(&app, PATH, &token, json!({"name": "   "})).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let no_body = send_request(&app, Method::POST, PATH, Some(&token), None).await;
    assert_eq!(no_body.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_explicit_slugs_are_rejected() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let too_long = "x".repeat(51);
    for slug in ["settings", "Has Spaces", "UPPER", "bad/slug", too_long.as_str()] {
        let response = post(&app, PATH, &token, json!({"name": "Acme", "slug": slug})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "slug {slug:?}");
    }
}

#[tokio::test]
async fn terms_required_when_both_urls_configured() {
    let app = setup_test_app_with(|config| {
        config.organizations.terms_url = Some("https://example.com/terms".into());
        config.organizations.privacy_url = Some("https://example.com/privacy".into());
    })
    .await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let refused = post(&app, PATH, &token, json!({"name": "hello world", "slug": "foobar"})).await;
    assert_eq!(refused.status(), StatusCode::BAD_REQUEST);

    let accepted = post(
        &app,
        PATH,
        &token,
        json!({"name": "hello world", "slug": "foobar", "agreeTerms": true}),
    )
    .await;
    assert_eq!(accepted.status(), StatusCode::CREATED);

    let body: Value = read_json(accepted).await;
    let org = app.state.organizations.get_organization_by_slug("foobar").await.unwrap().unwrap();
    assert_eq!(body["id"], org.id.to_string());

    let audit = app.state.audit.list_for_organization(&org.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].event, "organization.create");
    assert_eq!(audit[0].data["agreeTerms"], true);
}

#[tokio::test]
async fn terms_not_required_with_only_one_url() {
    let app = setup_test_app_with(|config| {
        config.organizations.terms_url = Some("https://example.com/terms".into());
        config.organizations.privacy_url = None;
    })
    .await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let response = post(&app, PATH, &token, json!({"name": "hello world", "slug": "foobar"})).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn creator_becomes_owner() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    post(&app, PATH, &token, json!({"name": "Mine", "slug": "mine"})).await;

    let response = send_request(&app, Method::GET, "/api/0/organizations/?owner=1", Some(&token), None)
        .await;
    let body: Vec<Value> = read_json(response).await;
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["organization"]["slug"], "mine");
    assert_eq!(body[0]["singleOwner"], true);
}

#[tokio::test]
async fn creation_can_be_disabled() {
    let app = setup_test_app_with(|config| config.organizations.allow_create = false).await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let response = post(&app, PATH, &token, json!({"name": "Nope"})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn creation_is_rate_limited_per_user() {
    let app = setup_test_app_with(|config| config.organizations.creations_per_hour = 2).await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;
    let alice_token = app.login(&alice).await;
    let bob_token = app.login(&bob).await;

    for name in ["One", "Two"] {
        let response = post(&app, PATH, &alice_token, json!({"name": name})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let limited = post(&app, PATH, &alice_token, json!({"name": "Three"})).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(RETRY_AFTER));

    let other = post(&app, PATH, &bob_token, json!({"name": "Bobs"})).await;
    assert_eq!(other.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn creation_requires_authentication() {
    let app = setup_test_app().await;
    let response =
        send_request(&app, Method::POST, PATH, None, Some(json!({"name": "Anon"}))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
