//! Server bootstrap — the HTTP composition root.

use std::net::SocketAddr;

use crate::routes::build_router;
use crate::state::AppState;

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, build_router(state)).await
}
