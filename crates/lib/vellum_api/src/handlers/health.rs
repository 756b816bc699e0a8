//! Liveness endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_connected: bool,
}

/// `GET /api/health`: version plus whether the user partition is reachable.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.oauth.config().database.as_deref();
    let store_connected = match state.stores.client(database).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Document store unreachable");
            false
        }
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: vellum_core::version().to_string(),
        store_connected,
    })
}
