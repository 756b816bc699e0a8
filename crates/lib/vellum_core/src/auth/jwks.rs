//! Identity provider key set (JWKS) retrieval.

use std::sync::Arc;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::KeySetError;

/// Lazily fetched provider key set.
///
/// The first successful fetch is kept for the life of the process. Concurrent
/// callers share one in-flight request; a failed fetch is not cached. An
/// unknown `kid` does not trigger a refetch.
#[derive(Debug)]
pub struct JwksCache {
    url: String,
    http: reqwest::Client,
    keys: OnceCell<Arc<JwkSet>>,
}

impl JwksCache {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            keys: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn get(&self) -> Result<Arc<JwkSet>, KeySetError> {
        self.keys
            .get_or_try_init(|| self.fetch())
            .await
            .map(Arc::clone)
    }

    async fn fetch(&self) -> Result<Arc<JwkSet>, KeySetError> {
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            error!(url = %self.url, error = %e, "JWKS fetch failed");
            transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %self.url, status = status.as_u16(), "JWKS endpoint returned an error");
            return Err(KeySetError::Status(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(url = %self.url, error = %e, "JWKS response is not JSON");
            if e.is_timeout() {
                KeySetError::Timeout
            } else {
                KeySetError::Malformed(e.to_string())
            }
        })?;

        let set = parse_key_set(&body)?;
        info!(keys = set.keys.len(), "Fetched JWKS");
        Ok(Arc::new(set))
    }
}

fn transport_error(e: reqwest::Error) -> KeySetError {
    if e.is_timeout() {
        KeySetError::Timeout
    } else {
        KeySetError::Transport(e.to_string())
    }
}

/// Parse a JWKS document. The `keys` list is required; individual keys that
/// cannot be parsed are skipped.
pub fn parse_key_set(body: &Value) -> Result<JwkSet, KeySetError> {
    let entries = body
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| KeySetError::Malformed("missing 'keys' list".to_string()))?;

    let keys = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Jwk>(entry.clone()) {
            Ok(jwk) => Some(jwk),
            Err(e) => {
                let kid = entry.get("kid").and_then(Value::as_str).unwrap_or("<none>");
                debug!(kid, error = %e, "Skipping unusable JWK");
                None
            }
        })
        .collect();

    Ok(JwkSet { keys })
}
