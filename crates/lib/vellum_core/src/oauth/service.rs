//! The exchange service behind `POST /oauth/token`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info};

use super::exchange::exchange_authorization_code;
use super::users::upsert_user;
use super::ExchangeError;
use crate::auth::{Claims, JwtError, JwtHelper};
use crate::config::{ConfigError, OAuthConfig};
use crate::documents::ClientRegistry;
use crate::models::auth::{TokenRequest, TokenResponse};

/// OAuth client for one configured application.
#[derive(Debug)]
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
    jwt: Arc<JwtHelper>,
    stores: Arc<ClientRegistry>,
}

impl OAuthClient {
    /// Validate `config` and build the client. `stores` provides the user
    /// document partition.
    pub fn new(config: OAuthConfig, stores: Arc<ClientRegistry>) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http_timeout",
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        let jwt = Arc::new(JwtHelper::new(&config, http.clone()));
        Ok(Self {
            config,
            http,
            jwt,
            stores,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Shared JWT helper; the auth extractors verify with the same instance.
    pub fn jwt(&self) -> Arc<JwtHelper> {
        Arc::clone(&self.jwt)
    }

    /// Run the full exchange for one token request.
    pub async fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, ExchangeError> {
        if request.client_id != self.config.client_id {
            error!(client_id = %request.client_id, "Invalid client_id");
            return Err(ExchangeError::InvalidClient);
        }

        let tokens = exchange_authorization_code(
            &self.http,
            &self.config.idp_token_url,
            &self.config.client_secret,
            request,
        )
        .await?;

        let Some(id_token) = tokens.id_token else {
            error!("No id_token in OAuth response");
            return Err(ExchangeError::MissingIdToken);
        };

        let claims = self
            .jwt
            .verify_external_token(&id_token, &request.client_id)
            .await
            .map_err(|e| match e {
                JwtError::Rejected(rejection) => ExchangeError::Unauthorized(rejection),
                JwtError::KeySetUnavailable(cause) => ExchangeError::KeySetUnavailable(cause),
                JwtError::Signing(detail) => ExchangeError::Signing(detail),
            })?;

        let sub = match claims.get("sub").and_then(Value::as_str) {
            Some(sub) if !sub.is_empty() => sub.to_string(),
            _ => {
                error!("Missing 'sub' claim in external token");
                return Err(ExchangeError::MissingSubject);
            }
        };
        info!(sub = %sub, "Verified external token");

        let store = self.stores.client(self.config.database.as_deref()).await?;
        upsert_user(store.as_ref(), &sub, &claims, &self.config.additional_user_fields)
            .await
            .inspect_err(|e| error!(sub = %sub, error = %e, "Failed to save user"))?;

        let access_token = self
            .jwt
            .generate_internal_token(&mint_payload(&sub, &claims), &self.config.audience)
            .map_err(|e| {
                error!(error = %e, "Failed to generate JWT");
                ExchangeError::Signing(e.to_string())
            })?;

        Ok(TokenResponse::bearer(
            access_token,
            self.config.access_token_ttl_secs(),
        ))
    }
}

/// Claims carried into the internal token, before the registered ones are added.
fn mint_payload(sub: &str, external: &Claims) -> Claims {
    let mut payload = Map::new();
    payload.insert("sub".into(), Value::from(sub));
    for claim in ["name", "email"] {
        if let Some(value) = external.get(claim).filter(|v| !v.is_null()) {
            payload.insert(claim.into(), value.clone());
        }
    }
    payload.insert("role".into(), Value::from("user"));
    payload
}
