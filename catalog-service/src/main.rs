use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tonic::transport::Server;

use catalog_service::config::CatalogConfig;
use catalog_service::db::Database;
use catalog_service::grpc::proto::product_service_server::ProductServiceServer;
use catalog_service::grpc::ProductServiceImpl;
use catalog_service::{build_router, AppState};
use service_core::auth::{KeyStore, KeyStoreConfig, TokenVerifier};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = CatalogConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        http_port = config.http_port,
        rpc_port = config.rpc_port,
        "Starting catalog service"
    );

    // Block startup until the identity service's verifying key is
    // available; exiting non-zero on timeout lets the orchestration layer
    // restart us in dependency order.
    let keys = KeyStore::acquire(KeyStoreConfig {
        public_key_path: config.idp_public_key_path.clone().map(Into::into),
        public_key_url: config.idp_public_key_url.clone(),
        ..KeyStoreConfig::default()
    })
    .await?;
    let verifier = Arc::new(TokenVerifier::new(Arc::new(keys)));

    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let state = AppState {
        config: config.clone(),
        db,
        verifier,
    };

    // Internal RPC server.
    let rpc_addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], config.rpc_port));
    let product_service = ProductServiceImpl::new(state.clone());
    let rpc_server = tokio::spawn(async move {
        tracing::info!(addr = %rpc_addr, "Starting gRPC server");
        if let Err(e) = Server::builder()
            .add_service(ProductServiceServer::new(product_service))
            .serve(rpc_addr)
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
        }
    });

    // Public HTTP server.
    let app = build_router(state);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!(addr = %http_addr, "Listening for HTTP");

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    rpc_server.abort();
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
