//! Storefront identity provider.
//!
//! Owns user accounts and the RSA signing key. Issues RS256 access and
//! refresh tokens, gates login behind an optional TOTP second factor
//! with single-use recovery codes, publishes the verifying key, and
//! serves the internal `ValidateUser` RPC.

pub mod config;
pub mod db;
pub mod dtos;
pub mod grpc;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use service_core::auth::{require_auth, TokenVerifier};
use service_core::error::AppError;

use crate::config::IdentityConfig;
use crate::db::Database;
use crate::handlers::{auth, two_factor};
use crate::services::{JwtService, KeyMaterial, TwoFactorService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub db: Database,
    pub jwt: JwtService,
    pub two_factor: TwoFactorService,
    pub verifier: Arc<TokenVerifier>,
    pub key_material: KeyMaterial,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/token", post(auth::obtain_token))
        .route("/token/refresh", post(auth::refresh))
        .route("/public-key", get(auth::public_key))
        .route("/2fa/verify-login", post(two_factor::verify_login));

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/password", post(auth::change_password))
        .route("/2fa/setup", post(two_factor::setup))
        .route("/2fa/verify-setup", post(two_factor::verify_setup))
        .route("/2fa/status", get(two_factor::status))
        .route("/2fa/disable", post(two_factor::disable))
        .route(
            "/2fa/recovery-codes/regenerate",
            post(two_factor::regenerate_codes),
        )
        .route(
            "/2fa/recovery-codes/download",
            post(two_factor::download_codes),
        )
        .layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", public_routes.merge(protected_routes))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Health check: database connectivity plus signing-key availability.
async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "checks": {
            "database": "up",
            "signing_key": state.key_material.key_id,
        }
    })))
}
