//! Authorization-code exchange with the identity provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use super::ExchangeError;
use crate::models::auth::{GrantType, TokenRequest};

#[derive(Debug, Serialize)]
struct CodeExchangeBody<'a> {
    code: &'a str,
    code_verifier: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: GrantType,
}

/// Token response from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Trade an authorization code for provider tokens.
///
/// The request is JSON-encoded. The client's timeout applies; there are no
/// retries.
pub async fn exchange_authorization_code(
    http: &reqwest::Client,
    token_url: &str,
    client_secret: &str,
    request: &TokenRequest,
) -> Result<ProviderTokens, ExchangeError> {
    let body = CodeExchangeBody {
        code: &request.code,
        code_verifier: &request.code_verifier,
        client_id: &request.client_id,
        client_secret,
        redirect_uri: &request.redirect_uri,
        grant_type: request.grant_type,
    };

    let resp = http
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                error!("OAuth token exchange timed out");
                ExchangeError::Timeout
            } else {
                error!(error = %e, "OAuth token exchange network error");
                ExchangeError::ProviderUnavailable(e.to_string())
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        error!(status = status.as_u16(), body = %text, "OAuth token exchange failed");
        return Err(ExchangeError::CodeRejected {
            status: status.as_u16(),
        });
    }

    resp.json::<ProviderTokens>().await.map_err(|e| {
        if e.is_timeout() {
            error!("OAuth token response timed out");
            ExchangeError::Timeout
        } else {
            error!(error = %e, "OAuth token response parse error");
            ExchangeError::ProviderUnavailable(format!("unparseable token response: {e}"))
        }
    })
}
