//! Shared fixtures: a mock identity provider backed by wiremock.

#![allow(dead_code)]

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vellum_core::config::OAuthConfig;

pub const IDP_KID: &str = "idp-test-key-1";
pub const CLIENT_ID: &str = "client-1";
pub const CLIENT_SECRET: &str = "client-secret";
pub const AUDIENCE: &str = "https://api.example.com";
pub const JWT_SECRET: &str = "integration-test-secret";
pub const JWT_ISSUER: &str = "https://issuer.example.com";

const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/idp_rsa_private.pem");
const JWKS: &str = include_str!("../fixtures/idp_jwks.json");

/// Mock identity provider serving `/oauth/token` and `/.well-known/jwks.json`.
pub struct MockIdp {
    pub server: MockServer,
}

impl MockIdp {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer URL; the token and JWKS endpoints hang off it.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> OAuthConfig {
        let mut config = OAuthConfig::new(
            CLIENT_ID,
            CLIENT_SECRET,
            AUDIENCE,
            self.issuer(),
            JWT_SECRET,
            JWT_ISSUER,
        );
        config.http_timeout = Duration::from_secs(2);
        config
    }

    pub async fn mount_jwks(&self) {
        let body: Value = serde_json::from_str(JWKS).expect("fixture JWKS is valid JSON");
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jwks_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Token endpoint answering with `id_token`.
    pub async fn mount_id_token(&self, id_token: &str) {
        self.mount_token_response(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access-token",
            "token_type": "Bearer",
            "id_token": id_token,
        })))
        .await;
    }

    /// Standard claims for an ID token issued by this provider.
    pub fn id_claims(&self, sub: &str) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": sub,
            "email": format!("{sub}@example.com"),
            "name": "Ada Lovelace",
            "iss": self.issuer(),
            "aud": CLIENT_ID,
            "iat": now,
            "exp": now + 600,
        })
    }

    pub async fn requests_to(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }
}

/// Sign `claims` with the fixture RSA key.
pub fn sign_id_token(claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("signing succeeds")
}

/// A verifier that satisfies RFC 7636.
pub fn code_verifier() -> String {
    "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string()
}
