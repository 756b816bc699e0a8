//! # vellum_api
//!
//! HTTP API library for Vellum.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vellum_core::documents::ClientRegistry;
use vellum_core::oauth::OAuthClient;

use crate::handlers::{auth, health, oauth};
use crate::middleware::auth::Authenticator;

/// Shared application state passed to all handlers.
#[derive(Clone, FromRef)]
pub struct AppState {
    /// Token exchange service.
    pub oauth: Arc<OAuthClient>,
    /// Bearer-token verification for the auth extractors.
    pub auth: Authenticator,
    /// Document store clients, one per partition.
    pub stores: Arc<ClientRegistry>,
}

impl AppState {
    /// Build state around `oauth`; the authenticator shares its JWT helper
    /// and audience.
    pub fn new(oauth: OAuthClient, stores: Arc<ClientRegistry>) -> Self {
        let auth = Authenticator::new(oauth.jwt(), oauth.config().audience.clone());
        Self {
            oauth: Arc::new(oauth),
            auth,
            stores,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `vellum_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    vellum_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/oauth/token", post(oauth::token_handler))
        .route("/auth/session", get(auth::session_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
