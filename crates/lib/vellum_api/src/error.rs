//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use vellum_core::auth::GENERIC_REJECTION;
use vellum_core::oauth::ExchangeError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// 401 with a `WWW-Authenticate` challenge.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, challenge: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// No usable credentials were presented.
    pub fn missing_credentials(message: impl Into<String>, realm: &str) -> Self {
        AppError::Unauthorized {
            message: message.into(),
            challenge: format!("Bearer realm=\"{realm}\""),
        }
    }

    /// Credentials were presented but did not verify.
    pub fn invalid_token() -> Self {
        AppError::Unauthorized {
            message: GENERIC_REJECTION.to_string(),
            challenge: "Bearer error=\"invalid_token\"".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized { message, .. } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message.as_str())
            }
            AppError::Timeout(m) => (StatusCode::REQUEST_TIMEOUT, "timeout", m.as_str()),
            AppError::Unavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", m.as_str())
            }
            AppError::Internal(detail) => {
                error!(detail = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if let AppError::Unauthorized { challenge, .. } = &self
            && let Ok(value) = HeaderValue::from_str(challenge)
        {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl From<ExchangeError> for AppError {
    fn from(e: ExchangeError) -> Self {
        let message = e.public_message();
        match e {
            ExchangeError::InvalidClient
            | ExchangeError::CodeRejected { .. }
            | ExchangeError::MissingIdToken
            | ExchangeError::MissingSubject => AppError::Validation(message),
            ExchangeError::Unauthorized(_) => AppError::invalid_token(),
            ExchangeError::Timeout => AppError::Timeout(message),
            ExchangeError::ProviderUnavailable(_)
            | ExchangeError::KeySetUnavailable(_)
            | ExchangeError::UserStore(_) => AppError::Unavailable(message),
            ExchangeError::Signing(detail) => AppError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::auth::{KeySetError, RejectReason, TokenRejection};

    fn status_of(e: ExchangeError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn exchange_errors_map_to_statuses() {
        assert_eq!(status_of(ExchangeError::InvalidClient), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ExchangeError::CodeRejected { status: 400 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ExchangeError::MissingIdToken), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ExchangeError::Timeout), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            status_of(ExchangeError::ProviderUnavailable("refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ExchangeError::KeySetUnavailable(KeySetError::Timeout)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ExchangeError::Signing("bad key".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rejected_token_carries_invalid_token_challenge() {
        let response = AppError::from(ExchangeError::Unauthorized(TokenRejection::new(
            RejectReason::Expired,
            "exp in the past",
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            "Bearer error=\"invalid_token\""
        );
    }

    #[test]
    fn missing_credentials_carries_realm() {
        let response =
            AppError::missing_credentials("Missing authorization header", "https://api.example.com")
                .into_response();
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            "Bearer realm=\"https://api.example.com\""
        );
    }
}
