use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::routes::create_router;
use super::state::AppState;

/// Binds the HTTP listener. Left to the caller (the dispatcher's startup
/// sequence) so a bind failure is fatal rather than a logged no-op from a
/// detached task.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP listener started");
    Ok(listener)
}

/// Serves the HTTP front-end on an already-bound `listener` until `cancel`
/// fires, at which point axum's graceful shutdown waits for in-flight
/// requests to finish before returning.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) {
    let router = create_router(state);
    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
    {
        error!(error = %e, "HTTP server exited with an error");
    }
}
