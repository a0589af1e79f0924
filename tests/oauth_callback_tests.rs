// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP tests for the OAuth redirect endpoint and the health check.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use gym_buddy::services::StartOutcome;
use tower::ServiceExt;

mod common;
use common::{create_test_app, state_from_url, Outcome, TestApp, SHEET_ID};

const USER: u64 = 9001;

async fn get(app: &TestApp, uri: &str) -> Response {
    app.router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn pending_state(app: &TestApp) -> String {
    match app.state.connection.start(USER, false).await.unwrap() {
        StartOutcome::AuthorizationUrl(url) => state_from_url(&url),
        other => panic!("expected an authorization URL, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = get(&app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_callback_links_account() {
    let app = create_test_app();
    let state = pending_state(&app).await;

    let response = get(
        &app,
        &format!("/auth/google/callback?code=abc&state={}", state),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Referrer-Policy").unwrap(), "no-referrer");
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    let body = body_text(response).await;
    assert!(body.contains("Google Sheets connected"));
    assert!(body.contains("new workout tracker sheet"));

    let credential = app.state.connection.tokens().get(USER).await.unwrap();
    assert_eq!(credential.resource_id.as_deref(), Some(SHEET_ID));
}

#[tokio::test]
async fn test_callback_replay_is_not_found() {
    let app = create_test_app();
    let state = pending_state(&app).await;
    let uri = format!("/auth/google/callback?code=abc&state={}", state);

    assert_eq!(get(&app, &uri).await.status(), StatusCode::OK);

    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Link expired"));
    assert_eq!(app.oauth.exchanges(), 1);
}

#[tokio::test]
async fn test_callback_unknown_state() {
    let app = create_test_app();
    let response = get(&app, "/auth/google/callback?code=abc&state=forged").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.oauth.exchanges(), 0);
}

#[tokio::test]
async fn test_callback_missing_parameters() {
    let app = create_test_app();

    let response = get(&app, "/auth/google/callback?code=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let state = pending_state(&app).await;
    let response = get(&app, &format!("/auth/google/callback?state={}", state)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A request without a code does not burn the state.
    let response = get(
        &app,
        &format!("/auth/google/callback?code=abc&state={}", state),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_callback_user_declined() {
    let app = create_test_app();
    let state = pending_state(&app).await;

    let response = get(
        &app,
        &format!("/auth/google/callback?error=access_denied&state={}", state),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Authorization cancelled"));

    // The state was consumed.
    let response = get(
        &app,
        &format!("/auth/google/callback?code=abc&state={}", state),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.oauth.exchanges(), 0);
}

#[tokio::test]
async fn test_callback_provider_down() {
    let app = create_test_app();
    app.oauth.set_exchange(Outcome::Transient);
    let state = pending_state(&app).await;

    let response = get(
        &app,
        &format!("/auth/google/callback?code=abc&state={}", state),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("Google is not responding"));
    assert!(!app.state.connection.tokens().exists(USER).await.unwrap());
}
