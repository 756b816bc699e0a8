//! OAuth client and token configuration.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Default lifetime of minted access tokens.
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

/// Default timeout for calls to the identity provider.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Everything the exchange service and the JWT helper need.
///
/// Build with [`OAuthConfig::new`], adjust the public fields, then call
/// [`OAuthConfig::validate`].
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Audience of minted access tokens; also the bearer realm.
    pub audience: String,

    /// Expected `iss` of identity-provider tokens.
    pub idp_issuer: String,
    pub idp_token_url: String,
    pub idp_jwks_url: String,
    pub idp_algorithm: Algorithm,

    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub jwt_issuer: String,
    pub access_token_ttl_minutes: i64,

    /// Document partition holding the `users` collection.
    pub database: Option<String>,
    /// Extra fields merged into every upserted user document.
    pub additional_user_fields: Map<String, Value>,

    pub http_timeout: Duration,
}

impl OAuthConfig {
    /// Config with defaults for every optional setting. The identity-provider
    /// endpoints default to the well-known locations under `idp_issuer`.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
        idp_issuer: impl Into<String>,
        jwt_secret: impl Into<String>,
        jwt_issuer: impl Into<String>,
    ) -> Self {
        let idp_issuer = idp_issuer.into();
        let base = idp_issuer.trim_end_matches('/');
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            idp_token_url: format!("{base}/oauth/token"),
            idp_jwks_url: format!("{base}/.well-known/jwks.json"),
            idp_issuer,
            idp_algorithm: Algorithm::RS256,
            jwt_secret: jwt_secret.into(),
            jwt_algorithm: Algorithm::HS256,
            jwt_issuer: jwt_issuer.into(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            database: None,
            additional_user_fields: Map::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Access-token lifetime in seconds.
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl_minutes * 60
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("audience", &self.audience),
            ("idp_issuer", &self.idp_issuer),
            ("jwt_secret", &self.jwt_secret),
            ("jwt_issuer", &self.jwt_issuer),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        check_http_url("idp_token_url", &self.idp_token_url)?;
        check_http_url("idp_jwks_url", &self.idp_jwks_url)?;

        if !is_hmac(self.jwt_algorithm) {
            return Err(ConfigError::Invalid {
                key: "jwt_algorithm",
                reason: format!("{:?} is not an HMAC algorithm", self.jwt_algorithm),
            });
        }
        if is_hmac(self.idp_algorithm) {
            return Err(ConfigError::Invalid {
                key: "idp_algorithm",
                reason: format!("{:?} cannot be used with a public key set", self.idp_algorithm),
            });
        }
        if self.access_token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "access_token_ttl_minutes",
                reason: "must be positive".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "http_timeout",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("audience", &self.audience)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_token_url", &self.idp_token_url)
            .field("idp_jwks_url", &self.idp_jwks_url)
            .field("idp_algorithm", &self.idp_algorithm)
            .field("jwt_secret", &"***")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("database", &self.database)
            .field("additional_user_fields", &self.additional_user_fields)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn check_http_url(key: &'static str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
