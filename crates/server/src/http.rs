//! HTTP server for the log sharding service.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::put;
use axum::Router;
use tokio::signal;
use tracing::{info, warn};

use crate::handlers::{handle_log, handle_purge, handle_query, AppState};

/// Routes of the public API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/log", put(handle_log))
        .route("/api/query", put(handle_query))
        .route("/api/purge", put(handle_purge))
        .with_state(state)
}

/// Serves `state` on `addr` until SIGINT or SIGTERM.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Starting logshard HTTP server on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated")?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Listen for SIGTERM and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
