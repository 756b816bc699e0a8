//! `POST /oauth/token` through the full router.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum::http::header::WWW_AUTHENTICATE;
use serde_json::json;
use wiremock::ResponseTemplate;

use common::{AUDIENCE, IDP_KID, TestApp, get, json_body, post_json, sign_id_token, token_request_body};
use vellum_core::documents::StoreConnector;
use vellum_core::oauth::USERS_COLLECTION;

#[tokio::test]
async fn exchanged_token_authenticates_the_user() {
    let app = TestApp::start().await;
    app.mount_jwks().await;
    app.mount_id_token(&sign_id_token(&app.id_claims("user-9"), IDP_KID))
        .await;

    let resp = app.send(post_json("/oauth/token", &token_request_body())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 1800);
    let access_token = body["access_token"].as_str().expect("access_token is string");

    let resp = app
        .send(get("/auth/me", Some(&format!("Bearer {access_token}"))))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["sub"], "user-9");
    assert_eq!(me["email"], "user-9@example.com");
    assert_eq!(me["name"], "Grace Hopper");
    assert_eq!(me["role"], "user");
    assert_eq!(me["aud"], AUDIENCE);

    let store = app.connector.connect("(default)").await.unwrap();
    assert!(store.get(USERS_COLLECTION, "user-9").await.unwrap().is_some());
}

#[tokio::test]
async fn wrong_client_is_bad_request() {
    let app = TestApp::start().await;
    let mut body = token_request_body();
    body["client_id"] = json!("intruder");

    let resp = app.send(post_json("/oauth/token", &body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json_body(resp).await;
    assert_eq!(err["error"], "validation_error");
    assert_eq!(err["message"], "Invalid client_id");
}

#[tokio::test]
async fn provider_rejection_is_bad_request() {
    let app = TestApp::start().await;
    app.mount_token_response(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
        .await;

    let resp = app.send(post_json("/oauth/token", &token_request_body())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["message"], "Failed to exchange code");
}

#[tokio::test]
async fn provider_timeout_is_request_timeout() {
    let app = TestApp::start().await;
    app.mount_token_response(
        ResponseTemplate::new(200)
            .set_body_json(json!({"id_token": "x"}))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let resp = app.send(post_json("/oauth/token", &token_request_body())).await;
    assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn key_set_outage_is_service_unavailable() {
    let app = TestApp::start().await;
    app.mount_jwks_response(ResponseTemplate::new(503)).await;
    app.mount_id_token(&sign_id_token(&app.id_claims("user-1"), IDP_KID))
        .await;

    let resp = app.send(post_json("/oauth/token", &token_request_body())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["error"], "service_unavailable");
}

#[tokio::test]
async fn foreign_id_token_is_unauthorized_without_details() {
    let app = TestApp::start().await;
    app.mount_jwks().await;
    let mut claims = app.id_claims("user-1");
    claims["iss"] = json!("https://evil.example.com");
    app.mount_id_token(&sign_id_token(&claims, IDP_KID)).await;

    let resp = app.send(post_json("/oauth/token", &token_request_body())).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()[WWW_AUTHENTICATE],
        "Bearer error=\"invalid_token\""
    );
    let err = json_body(resp).await;
    assert_eq!(err["message"], "Could not validate credentials");
    assert!(!err.to_string().contains("evil"));
}

#[tokio::test]
async fn health_reports_store() {
    let app = TestApp::start().await;
    let resp = app.send(get("/api/health", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storeConnected"], true);
    assert_eq!(body["version"], vellum_core::version());
}
