use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::support::{read_json, send_request, setup_test_app, PASSWORD};

#[tokio::test]
async fn login_sets_cookie_that_authenticates() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com").await;

    let response = send_request(
        &app,
        Method::POST,
        "/api/0/auth/login/",
        None,
        Some(json!({"email": "Alice@Example.com", "password": PASSWORD})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.starts_with("orgdesk_session="));
    assert!(cookie.contains("HttpOnly"));

    let body: Value = read_json(response).await;
    assert_eq!(body["email"], "alice@example.com");
    let token = body["token"].as_str().unwrap().to_string();

    let pair = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/0/organizations/")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        send_request(&app, Method::GET, "/api/0/organizations/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = setup_test_app().await;
    app.create_user("alice@example.com").await;

    let wrong = send_request(
        &app,
        Method::POST,
        "/api/0/auth/login/",
        None,
        Some(json!({"email": "alice@example.com", "password": "nope"})),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let malformed = send_request(
        &app,
        Method::POST,
        "/api/0/auth/login/",
        None,
        Some(json!({"email": "not-an-email", "password": "x"})),
    )
    .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = setup_test_app().await;
    let alice = app.create_user("alice@example.com").await;
    let token = app.login(&alice).await;

    let response = send_request(&app, Method::POST, "/api/0/auth/logout/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key(header::SET_COOKIE));

    let response =
        send_request(&app, Method::GET, "/api/0/organizations/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_version() {
    let app = setup_test_app().await;
    let response = send_request(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], orgdesk::VERSION);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;
    let response = send_request(&app, Method::GET, "/api/0/openapi.json", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = read_json(response).await;
    assert!(body["paths"]["/api/0/organizations/"].is_object());
}
