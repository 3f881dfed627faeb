//! Storefront order orchestrator.
//!
//! Creates orders by fanning out to identity-service and catalog-service
//! over resilient RPC (retry with exponential backoff inside per-target
//! circuit breakers), snapshots prices and inventory at purchase time,
//! and persists atomically with the owner id under field-level
//! encryption.

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

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

use crate::config::OrderConfig;
use crate::db::Database;
use crate::handlers::orders;
use crate::services::{FieldCipher, Orchestrator};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: OrderConfig,
    pub db: Database,
    pub orchestrator: Arc<Orchestrator>,
    pub cipher: FieldCipher,
    pub verifier: Arc<TokenVerifier>,
}

/// Build the HTTP router. Every order endpoint requires a valid access
/// token; the owner is always the token subject.
pub fn build_router(state: AppState) -> Router {
    let order_routes = Router::new()
        .route("/", post(orders::create))
        .route("/", get(orders::list_mine))
        .route("/all", get(orders::list_all))
        .route("/{id}", get(orders::get))
        .route("/{id}/status", post(orders::transition_status))
        .layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/orders", order_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "checks": { "database": "up" }
    })))
}
