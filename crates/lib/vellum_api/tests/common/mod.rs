//! Shared helpers: a wiremock identity provider and an in-memory app.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vellum_api::AppState;
use vellum_core::auth::Claims;
use vellum_core::config::OAuthConfig;
use vellum_core::documents::{ClientRegistry, MemoryConnector};
use vellum_core::oauth::OAuthClient;

pub const IDP_KID: &str = "idp-test-key-1";
pub const CLIENT_ID: &str = "client-1";
pub const AUDIENCE: &str = "https://api.example.com";
pub const JWT_SECRET: &str = "api-test-secret";
pub const JWT_ISSUER: &str = "https://issuer.example.com";

const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/idp_rsa_private.pem");
const JWKS: &str = include_str!("../fixtures/idp_jwks.json");

pub struct TestApp {
    pub idp: MockServer,
    pub state: AppState,
    pub connector: MemoryConnector,
}

impl TestApp {
    pub async fn start() -> Self {
        let idp = MockServer::start().await;
        let mut config = OAuthConfig::new(
            CLIENT_ID,
            "client-secret",
            AUDIENCE,
            idp.uri(),
            JWT_SECRET,
            JWT_ISSUER,
        );
        config.http_timeout = Duration::from_secs(2);

        let connector = MemoryConnector::new();
        let stores = Arc::new(ClientRegistry::new(Arc::new(connector.clone())));
        let oauth = OAuthClient::new(config, Arc::clone(&stores)).expect("valid config");
        Self {
            idp,
            state: AppState::new(oauth, stores),
            connector,
        }
    }

    pub fn router(&self) -> Router {
        vellum_api::router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.expect("request")
    }

    pub async fn mount_jwks(&self) {
        let body: Value = serde_json::from_str(JWKS).expect("fixture JWKS is valid JSON");
        self.mount_jwks_response(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    pub async fn mount_jwks_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(response)
            .mount(&self.idp)
            .await;
    }

    pub async fn mount_token_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(response)
            .mount(&self.idp)
            .await;
    }

    pub async fn mount_id_token(&self, id_token: &str) {
        self.mount_token_response(
            ResponseTemplate::new(200).set_body_json(json!({ "id_token": id_token })),
        )
        .await;
    }

    /// Standard claims for an ID token issued by the mock provider.
    pub fn id_claims(&self, sub: &str) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": sub,
            "email": format!("{sub}@example.com"),
            "name": "Grace Hopper",
            "iss": self.idp.uri(),
            "aud": CLIENT_ID,
            "iat": now,
            "exp": now + 600,
        })
    }

    /// Internal access token for `sub`, minted with the app's own helper.
    pub fn access_token(&self, sub: &str, audience: &str) -> String {
        let mut claims = Claims::new();
        claims.insert("sub".into(), json!(sub));
        claims.insert("email".into(), json!(format!("{sub}@example.com")));
        claims.insert("role".into(), json!("user"));
        self.state
            .oauth
            .jwt()
            .generate_internal_token(&claims, audience)
            .expect("signing succeeds")
    }
}

/// Sign arbitrary `claims` with the app's internal secret.
pub fn sign_internal(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("signing succeeds")
}

/// Internal claims for `sub`, issued `age_secs` ago and valid for `ttl_secs`.
pub fn internal_claims(sub: &str, age_secs: i64, ttl_secs: i64) -> Value {
    let iat = Utc::now().timestamp() - age_secs;
    json!({
        "sub": sub,
        "role": "user",
        "iss": JWT_ISSUER,
        "aud": AUDIENCE,
        "iat": iat,
        "exp": iat + ttl_secs,
    })
}

/// Sign `claims` with the fixture RSA key.
pub fn sign_id_token(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("signing succeeds")
}

pub fn token_request_body() -> Value {
    json!({
        "code": "auth-code-123",
        "code_verifier": "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk",
        "client_id": CLIENT_ID,
        "redirect_uri": "https://app.example.com/callback",
        "grant_type": "authorization_code",
    })
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}
