//! OAuth authorization-code exchange.
//!
//! The flow behind `POST /oauth/token`: check the client, trade the code for
//! provider tokens, verify the provider ID token, upsert the user document,
//! then mint an internal access token.

pub mod exchange;
pub mod service;
pub mod users;

use thiserror::Error;

use crate::auth::{GENERIC_REJECTION, KeySetError, TokenRejection};
use crate::documents::StoreError;

pub use service::OAuthClient;
pub use users::{USERS_COLLECTION, UpsertOutcome, upsert_user};

/// Errors from the token exchange. Each variant maps to one HTTP status.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Invalid client_id")]
    InvalidClient,

    #[error("Token exchange timed out")]
    Timeout,

    #[error("Failed to exchange code: provider returned HTTP {status}")]
    CodeRejected { status: u16 },

    #[error("OAuth service unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid token response: no id_token")]
    MissingIdToken,

    #[error("Invalid token: missing subject")]
    MissingSubject,

    #[error(transparent)]
    Unauthorized(TokenRejection),

    #[error(transparent)]
    KeySetUnavailable(KeySetError),

    #[error("Failed to save user data: {0}")]
    UserStore(#[from] StoreError),

    #[error("Failed to generate access token: {0}")]
    Signing(String),
}

impl ExchangeError {
    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ExchangeError::InvalidClient => "Invalid client_id".to_string(),
            ExchangeError::Timeout => "Token exchange timed out".to_string(),
            ExchangeError::CodeRejected { .. } => "Failed to exchange code".to_string(),
            ExchangeError::ProviderUnavailable(_) => "OAuth service unavailable".to_string(),
            ExchangeError::MissingIdToken => "Invalid token response".to_string(),
            ExchangeError::MissingSubject => "Invalid token: missing subject".to_string(),
            ExchangeError::Unauthorized(_) => GENERIC_REJECTION.to_string(),
            ExchangeError::KeySetUnavailable(_) => "JWKS service unavailable".to_string(),
            ExchangeError::UserStore(_) => "Failed to save user data".to_string(),
            ExchangeError::Signing(_) => "Failed to generate access token".to_string(),
        }
    }
}
