use std::sync::Arc;

use anyhow::{Context, Result};
use sitewatch_api::{router, state::AppState};
use sitewatch_config::AppConfig;
use sitewatch_storage::MemoryStorage;
use sitewatch_workers::WorkerService;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    info!(listen = %config.listen_addr, "Starting sitewatch");

    let storage = Arc::new(MemoryStorage::new());
    let worker_service = Arc::new(WorkerService::new(storage.clone(), config.clone()));
    worker_service.start().await;

    let state = AppState::new(storage, worker_service.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain: stop polling, let in-flight scans reach a safe point.
    worker_service.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
