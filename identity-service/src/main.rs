use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tonic::transport::Server;

use identity_service::config::IdentityConfig;
use identity_service::db::Database;
use identity_service::grpc::proto::user_service_server::UserServiceServer;
use identity_service::grpc::UserServiceImpl;
use identity_service::services::{keys, JwtService, TwoFactorService};
use identity_service::{build_router, AppState};
use service_core::auth::{KeyStore, TokenVerifier};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Fail fast on bad configuration: non-zero exit before serving.
    let config = IdentityConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        http_port = config.http_port,
        rpc_port = config.rpc_port,
        "Starting identity service"
    );

    // First boot generates the key pair and publishes the public half at
    // $KEY_DIR/jwt_public.pem; later boots reload it.
    let key_material = keys::load_or_generate(&config.key_dir)?;

    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    let jwt = JwtService::new(
        &key_material,
        config.access_token_ttl,
        config.refresh_token_ttl,
    )?;
    let verifier = Arc::new(TokenVerifier::new(Arc::new(KeyStore::from_pem(
        &key_material.public_pem,
    )?)));
    let two_factor = TwoFactorService::new(db.clone(), config.totp_issuer.clone());

    let state = AppState {
        config: config.clone(),
        db,
        jwt,
        two_factor,
        verifier,
        key_material,
    };

    // Internal RPC server.
    let rpc_addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], config.rpc_port));
    let user_service = UserServiceImpl::new(state.clone());
    let rpc_server = tokio::spawn(async move {
        tracing::info!(addr = %rpc_addr, "Starting gRPC server");
        if let Err(e) = Server::builder()
            .add_service(UserServiceServer::new(user_service))
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
