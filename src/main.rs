//! Audit Stream Service - Binary Entry Point
//!
//! Wires configuration, adapters, the broadcast hub and the ingestion
//! pipeline, then serves the HTTP API until SIGINT/SIGTERM. On shutdown the
//! HTTP server stops first, then the pipeline drains and flushes.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use audit_stream::api::{create_router, AppState, JwtVerifier};
use audit_stream::backend::{connect_backends, BoxError};
use audit_stream::config::AppConfig;
use audit_stream::hub::Hub;
use audit_stream::pipeline::{intake_queue, Pipeline};
use audit_stream::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();

    let config = AppConfig::from_env()?;
    info!(
        version = audit_stream::VERSION,
        bind = %config.bind_addr,
        backend = ?config.backend,
        "Starting audit stream service"
    );

    let verifier = JwtVerifier::from_config(&config.auth)?;
    let (cache, log) = connect_backends(&config).await?;

    let hub = Hub::spawn(config.hub.clone());
    let (queue, intake) = intake_queue(config.pipeline.queue_capacity);
    let pipeline = Pipeline::new(cache.clone(), log.clone(), hub.clone(), &config.pipeline)
        .spawn(intake);

    let state = Arc::new(AppState::new(queue, cache, log, hub, verifier));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP server failed");
    }

    info!("Draining intake queue");
    pipeline.shutdown().await;
    info!("Audit stream service stopped");

    served.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
