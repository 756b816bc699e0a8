//! API server configuration.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde_json::Value;

use vellum_core::config::{ConfigError, OAuthConfig};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// OAuth client, identity provider and token settings.
    pub oauth: OAuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                           | Default                              |
    /// |------------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                        | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`                     | `postgres://localhost:5432/vellum`   |
    /// | `OAUTH_CLIENT_ID`                  | required                             |
    /// | `OAUTH_CLIENT_SECRET`              | required                             |
    /// | `OAUTH_AUDIENCE`                   | required                             |
    /// | `IDP_JWT_ISSUER`                   | required                             |
    /// | `IDP_TOKEN_URL`                    | `<IDP_JWT_ISSUER>/oauth/token`       |
    /// | `IDP_JWKS_URL`                     | `<IDP_JWT_ISSUER>/.well-known/jwks.json` |
    /// | `IDP_JWT_ALGORITHM`                | `RS256`                              |
    /// | `JWT_SECRET_KEY`                   | required                             |
    /// | `JWT_ALGORITHM`                    | `HS256`                              |
    /// | `JWT_ISSUER`                       | required                             |
    /// | `JWT_ACCESS_TOKEN_EXPIRE_MINUTES`  | `30`                                 |
    /// | `DOCUMENT_DATABASE`                | default partition                    |
    /// | `ADDITIONAL_USER_FIELDS`           | `{}` (JSON object)                   |
    /// | `OAUTH_HTTP_TIMEOUT_SECS`          | `30`                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut oauth = OAuthConfig::new(
            required("OAUTH_CLIENT_ID")?,
            required("OAUTH_CLIENT_SECRET")?,
            required("OAUTH_AUDIENCE")?,
            required("IDP_JWT_ISSUER")?,
            required("JWT_SECRET_KEY")?,
            required("JWT_ISSUER")?,
        );
        if let Some(url) = get("IDP_TOKEN_URL") {
            oauth.idp_token_url = url;
        }
        if let Some(url) = get("IDP_JWKS_URL") {
            oauth.idp_jwks_url = url;
        }
        if let Some(alg) = get("IDP_JWT_ALGORITHM") {
            oauth.idp_algorithm = parse_algorithm("IDP_JWT_ALGORITHM", &alg)?;
        }
        if let Some(alg) = get("JWT_ALGORITHM") {
            oauth.jwt_algorithm = parse_algorithm("JWT_ALGORITHM", &alg)?;
        }
        if let Some(minutes) = get("JWT_ACCESS_TOKEN_EXPIRE_MINUTES") {
            oauth.access_token_ttl_minutes =
                minutes.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
                    reason: format!("`{minutes}` is not a whole number of minutes"),
                })?;
        }
        if let Some(secs) = get("OAUTH_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "OAUTH_HTTP_TIMEOUT_SECS",
                reason: format!("`{secs}` is not a whole number of seconds"),
            })?;
            oauth.http_timeout = Duration::from_secs(secs);
        }
        oauth.database = get("DOCUMENT_DATABASE");
        if let Some(raw) = get("ADDITIONAL_USER_FIELDS") {
            oauth.additional_user_fields = match serde_json::from_str(&raw) {
                Ok(Value::Object(fields)) => fields,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "ADDITIONAL_USER_FIELDS",
                        reason: "must be a JSON object".to_string(),
                    });
                }
            };
        }
        oauth.validate()?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/vellum".into()),
            oauth,
        })
    }
}

fn parse_algorithm(key: &'static str, value: &str) -> Result<Algorithm, ConfigError> {
    Algorithm::from_str(value.trim()).map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("unknown algorithm `{value}`"),
    })
}
