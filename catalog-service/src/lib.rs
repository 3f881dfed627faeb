//! Storefront catalog service.
//!
//! Owns product records and inventory counts. Verifies access tokens
//! locally with the key published by identity-service and serves the
//! internal `GetProductInfo` / `CheckAvailability` RPCs.

pub mod config;
pub mod db;
pub mod dtos;
pub mod grpc;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use service_core::auth::{require_auth, TokenVerifier};
use service_core::error::AppError;

use crate::config::CatalogConfig;
use crate::db::Database;
use crate::handlers::products;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: CatalogConfig,
    pub db: Database,
    pub verifier: Arc<TokenVerifier>,
}

/// Build the HTTP router. Browsing (list, get) is public; mutations
/// require a valid access token with the admin claim.
pub fn build_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.verifier.clone(), require_auth);

    let product_routes = Router::new()
        .route(
            "/",
            get(products::list).merge(post(products::create).layer(auth.clone())),
        )
        .route(
            "/{id}",
            get(products::get).merge(
                put(products::update)
                    .delete(products::delete)
                    .layer(auth),
            ),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/products", product_routes)
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
