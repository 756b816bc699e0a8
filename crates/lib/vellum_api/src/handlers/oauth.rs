//! OAuth token endpoint.

use axum::{Json, extract::State};
use tracing::info;

use vellum_core::models::auth::{TokenRequest, TokenResponse};

use crate::AppState;
use crate::error::AppResult;

/// `POST /oauth/token`: trade an authorization code for an access token.
pub async fn token_handler(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    info!(client_id = %body.client_id, "Token exchange requested");
    let response = state.oauth.exchange(&body).await?;
    Ok(Json(response))
}
