//! HTTP server lifecycle

use crate::config::ServerConfig;
use crate::error::{PipelineError, Result};
use crate::shutdown::ShutdownCoordinator;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Bind `config.host:config.port` and serve `app` until shutdown is signaled.
///
/// The peer socket address is attached to every request so that
/// address-based rate limiting works.
pub async fn start_server(
    config: &ServerConfig,
    app: Router,
    shutdown: Arc<ShutdownCoordinator>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    let notifier = shutdown.subscribe();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        notifier.wait().await;
        info!("Starting graceful shutdown");
    })
    .await
    .map_err(PipelineError::Io)?;

    info!("Server shutdown complete");
    Ok(())
}
