//! Caller identity endpoints.

use axum::Json;
use serde::{Deserialize, Serialize};

use vellum_core::models::auth::Principal;

use crate::middleware::auth::{CurrentUser, OptionalUser};

/// Response of `GET /auth/session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<Principal>,
}

/// `GET /auth/me`: the authenticated caller.
pub async fn me_handler(CurrentUser(principal): CurrentUser) -> Json<Principal> {
    Json(principal)
}

/// `GET /auth/session`: the caller if any; never rejects.
pub async fn session_handler(OptionalUser(user): OptionalUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: user.is_some(),
        user,
    })
}
