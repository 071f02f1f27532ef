//! jcr-hub library target.
//!
//! Reference live-order hub: the authoritative per-bar order state, the
//! identity endpoint the access gate calls, and the `/live` WebSocket the
//! live order channel subscribes to. Exposes the router and state for
//! integration tests; the binary `main.rs` depends on this library target.

pub mod api_types;
pub mod codec;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve the bare router on `addr` from a background task and return the
/// bound address (use port 0 for an ephemeral one).
pub async fn spawn_server(
    addr: SocketAddr,
    state: Arc<state::HubState>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    let app = routes::build_router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server stopped");
        }
    });
    Ok((bound, handle))
}
