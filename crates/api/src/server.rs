//! Process bootstrap: document load, bind, serve, shutdown.

use anyhow::{Context, Result};

use crate::config::ServerConfig;

/// Load the OpenAPI document, bind, and serve until Ctrl+C or SIGTERM.
///
/// A document that cannot be loaded is fatal: the server never binds.
pub async fn run(config: ServerConfig) -> Result<()> {
    let document = match config.load_document() {
        Ok(document) => document,
        Err(e) => {
            tracing::error!(error = %e, "failed to load OpenAPI document");
            return Err(e).context("failed to load OpenAPI document");
        }
    };
    tracing::info!(
        title = %document.info.title,
        version = %document.info.version,
        validate_requests = config.validate_requests,
        "loaded OpenAPI document"
    );

    let app = crate::app::build_app(&config, document);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
