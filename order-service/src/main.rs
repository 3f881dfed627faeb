use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use order_service::config::OrderConfig;
use order_service::db::Database;
use order_service::services::{FieldCipher, Orchestrator};
use order_service::{build_router, AppState};
use service_core::auth::{KeyStore, KeyStoreConfig, TokenVerifier};
use service_core::grpc::{CatalogClient, IdentityClient};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = OrderConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        http_port = config.http_port,
        "Starting order service"
    );

    // Dependencies boot before us (identity, then catalog); still, block
    // until the verifying key is reachable and exit non-zero on timeout.
    let keys = KeyStore::acquire(KeyStoreConfig {
        public_key_path: config.idp_public_key_path.clone().map(Into::into),
        public_key_url: config.idp_public_key_url.clone(),
        ..KeyStoreConfig::default()
    })
    .await?;
    let verifier = Arc::new(TokenVerifier::new(Arc::new(keys)));

    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let identity = IdentityClient::new(config.rpc_client_config(&config.identity_rpc_url))?;
    let catalog = CatalogClient::new(config.rpc_client_config(&config.catalog_rpc_url))?;
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(identity), Arc::new(catalog)));

    let cipher = FieldCipher::new(config.field_encryption_key);

    let state = AppState {
        config: config.clone(),
        db,
        orchestrator,
        cipher,
        verifier,
    };

    let app = build_router(state);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!(addr = %http_addr, "Listening for HTTP");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
