//! Bearer authentication: the `require_auth` middleware and the
//! `CurrentUser` / `OptionalUser` extractors.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use vellum_core::auth::JwtHelper;
use vellum_core::models::auth::Principal;

use crate::error::AppError;

/// Verifies internal access tokens for one audience.
#[derive(Debug, Clone)]
pub struct Authenticator {
    jwt: Arc<JwtHelper>,
    audience: String,
}

impl Authenticator {
    pub fn new(jwt: Arc<JwtHelper>, audience: impl Into<String>) -> Self {
        Self {
            jwt,
            audience: audience.into(),
        }
    }

    /// Audience expected in tokens; also the realm of missing-credential
    /// challenges.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Authenticate the caller from the `Authorization` header.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AppError> {
        let token = bearer_token(headers).ok_or_else(|| {
            AppError::missing_credentials("Missing authorization header", &self.audience)
        })?;

        let claims = self
            .jwt
            .verify_internal_token(token, &self.audience)
            .map_err(|_| AppError::invalid_token())?;

        let principal = Principal::from_claims(claims).map_err(|e| {
            warn!(error = %e, "Token claims do not describe a principal");
            AppError::invalid_token()
        })?;

        info!(sub = %principal.sub, "User authenticated");
        Ok(principal)
    }
}

/// Token from `Authorization: Bearer <token>`. A missing header, another
/// scheme or an empty token all count as no credentials.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// The authenticated caller. Rejects with 401 when the request carries no
/// valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already verified by `require_auth`.
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }
        Authenticator::from_ref(state)
            .authenticate(&parts.headers)
            .map(CurrentUser)
    }
}

/// The caller if authenticated, `None` otherwise. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalUser
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Authenticator::from_ref(state).authenticate(&parts.headers) {
            Ok(principal) => Ok(OptionalUser(Some(principal))),
            Err(e) => {
                debug!(error = %e, "Proceeding without a user");
                Ok(OptionalUser(None))
            }
        }
    }
}

/// Axum middleware: authenticates the bearer token and injects
/// `CurrentUser` into request extensions.
pub async fn require_auth(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = auth.authenticate(request.headers())?;
    request.extensions_mut().insert(CurrentUser(principal));
    Ok(next.run(request).await)
}
