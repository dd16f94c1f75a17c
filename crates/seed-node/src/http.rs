//! # Peer List HTTP API
//!
//! - `GET /peers` - the address book selection as a JSON string of
//!   comma-joined `id@ip:port` entries
//! - `GET /health` - `ok`

use std::io;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use seed_pex::PeerListProvider;

type Provider = Arc<dyn PeerListProvider>;

pub fn router(provider: Provider) -> Router {
    Router::new()
        .route("/peers", get(peers))
        .route("/health", get(health))
        .with_state(provider)
}

async fn peers(State(provider): State<Provider>) -> Json<String> {
    let selection = provider.peer_selection();
    debug!(count = selection.len(), "Serving peer list");
    let joined = selection
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Json(joined)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve on `listener` until `shutdown` turns true.
pub async fn serve(
    listener: TcpListener,
    provider: Provider,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Peer list API listening");
    }
    axum::serve(listener, router(provider))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
