use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, RelayError, Result};
use crate::hookrelay::net::webhook::router;
use crate::hookrelay::pubsub::PubSub;

/// Binds the HTTP listener. Failure here is fatal for the process.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        RelayError::new(ErrorCode::BindFailed, format!("Failed to bind {}: {}", addr, e))
    })
}

/// Serves the webhook router until `shutdown` fires, then drains in-flight requests
pub async fn run_webhook_server(
    listener: TcpListener,
    bus: Arc<PubSub>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Webhook server running on {}", addr);

    axum::serve(listener, router(bus))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| RelayError::new(ErrorCode::ServeFailed, e.to_string()))?;

    info!("Webhook server on {} stopped", addr);
    Ok(())
}
