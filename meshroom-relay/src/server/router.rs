use crate::config::RelayConfig;
use crate::hub::RelayHub;
use crate::server::ws_handler;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Relay routes: `GET /ws/{room}` upgrades to a signaling socket.
pub fn router(hub: RelayHub) -> Router {
    Router::new()
        .route("/ws/{room}", get(ws_handler))
        .with_state(hub)
}

/// Runs the relay on `addr` until the server stops.
pub async fn serve(addr: SocketAddr, config: RelayConfig) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Signaling relay listening on ws://{}", addr);

    axum::serve(listener, router(RelayHub::new(config)))
        .await
        .context("Relay server stopped")
}

/// Binds `addr` and serves in the background. Returns the bound address
/// (useful with port 0) and the hub behind it.
pub async fn spawn(
    addr: SocketAddr,
    config: RelayConfig,
) -> Result<(SocketAddr, RelayHub, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr()?;
    let hub = RelayHub::new(config);
    let app = router(hub.clone());

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Relay server failed: {}", e);
        }
    });
    info!("Signaling relay listening on ws://{}", local);

    Ok((local, hub, task))
}
