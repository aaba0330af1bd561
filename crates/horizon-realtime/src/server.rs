//! HTTP server and routing.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use futures::StreamExt;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::RealtimeState;

/// How long `run` waits for open sessions to finish their close handshake.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the Axum router.
///
/// Every path other than `/health` accepts a WebSocket upgrade.
pub fn create_router(state: Arc<RealtimeState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(ws_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<RealtimeState>>) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            let sessions = state.sessions.clone();
            sessions.track_future(handle_socket(socket, state))
        })
}

/// Run the message router over an upgraded socket.
async fn handle_socket(socket: WebSocket, state: Arc<RealtimeState>) {
    let (sink, stream) = socket.split();
    match state.router.serve(sink, stream).await {
        Ok(id) => debug!(conn_id = %id, "WebSocket session finished"),
        Err(e) => warn!(error = %e, "WebSocket session rejected"),
    }
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<RealtimeState>>) -> impl IntoResponse {
    let status = if state.is_shutting_down() {
        "draining"
    } else {
        "ok"
    };

    Json(json!({
        "status": status,
        "connections": state.connection_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Serves the upgrade endpoint until the shared shutdown token fires.
pub struct RealtimeServer {
    state: Arc<RealtimeState>,
}

impl RealtimeServer {
    pub fn new(state: Arc<RealtimeState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<RealtimeState> {
        self.state.clone()
    }

    /// Accept connections on `listener` until shutdown.
    ///
    /// Open WebSocket connections observe the same token and close with
    /// 1001 (going away); returns once they have all been deregistered or
    /// the drain timeout has passed.
    pub async fn run(&self, listener: TcpListener) -> io::Result<()> {
        let app = create_router(self.state.clone());
        let shutdown = self.state.shutdown.clone();

        info!(addr = %listener.local_addr()?, "Realtime server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        // Upgraded sockets outlive the HTTP connections axum tracks.
        let sessions = &self.state.sessions;
        sessions.close();
        if tokio::time::timeout(SESSION_DRAIN_TIMEOUT, sessions.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = sessions.len(),
                "Sessions still open after drain timeout"
            );
        }

        info!(
            remaining = self.state.registry.len(),
            "Realtime server stopped"
        );
        Ok(())
    }

    /// Begin shutdown: stop accepting and close every open connection.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
