//! Per-connection receive loop.
//!
//! The router registers a connection, classifies every inbound frame and
//! answers on the same connection:
//!
//! - `{"type": "NEW_USER"}` gets `{"type": "SERVERS", "payload": [...]}`
//! - anything else (other tags, malformed JSON) is echoed back unchanged
//!
//! The loop ends on a peer close, a transport error or process shutdown,
//! after which the connection is closed and deregistered exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, close_code};
use futures::{Sink, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use horizon_protocols::{ChannelError, InboundEnvelope, OutboundEnvelope, SnapshotProvider};

use crate::connection::{Connection, ConnectionId};
use crate::registry::ConnectionRegistry;

/// How long teardown waits on the writer before aborting it.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default outbound queue size per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Routes inbound frames for one connection at a time; cheap to clone and
/// shared by every connection task.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    snapshots: Arc<dyn SnapshotProvider>,
    shutdown: CancellationToken,
    queue_capacity: usize,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        snapshots: Arc<dyn SnapshotProvider>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            snapshots,
            shutdown,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the per-connection outbound queue size.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Run one connection to completion.
    ///
    /// Returns the connection's ID once it has been closed and deregistered,
    /// or the registration error if it could not be registered.
    pub async fn serve<S, R, E>(&self, sink: S, stream: R) -> Result<ConnectionId, ChannelError>
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let (conn, writer) = Connection::spawn(sink, self.queue_capacity);
        let id = conn.id();

        if let Err(e) = self.registry.add(conn.clone()) {
            error!(conn_id = %id, error = %e, "Failed to register connection");
            conn.close(close_frame(close_code::ERROR, "registration failed"));
            drop(conn);
            finish_writer(id, writer).await;
            return Err(e);
        }
        info!(conn_id = %id, "WebSocket connection registered");

        let frame = self.listen(&conn, stream).await;
        conn.close(frame);

        if self.registry.remove(id).is_none() {
            warn!(conn_id = %id, "Connection already deregistered");
        }
        drop(conn);
        finish_writer(id, writer).await;

        info!(conn_id = %id, "WebSocket connection closed");
        Ok(id)
    }

    /// Receive until the connection should close; returns the close frame to send.
    async fn listen<R, E>(&self, conn: &Connection, mut stream: R) -> CloseFrame
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(conn_id = %conn.id(), "Shutdown requested");
                    return close_frame(close_code::AWAY, "server shutting down");
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Close(frame))) => {
                    debug!(conn_id = %conn.id(), ?frame, "Peer closed connection");
                    return reply_to_peer_close(frame);
                }
                Some(Ok(message)) => {
                    // A reply can wait on a full queue; shutdown must still get through.
                    let answered = tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => {
                            debug!(conn_id = %conn.id(), "Shutdown requested while answering");
                            return close_frame(close_code::AWAY, "server shutting down");
                        }
                        answered = self.dispatch(conn, message) => answered,
                    };
                    if let Err(e) = answered {
                        warn!(conn_id = %conn.id(), error = %e, "Failed to answer message");
                        return close_frame(close_code::ERROR, "");
                    }
                }
                Some(Err(e)) => {
                    warn!(conn_id = %conn.id(), error = %e, "WebSocket receive error");
                    return close_frame(close_code::ERROR, "");
                }
                None => {
                    debug!(conn_id = %conn.id(), "Stream ended without close frame");
                    return close_frame(close_code::NORMAL, "");
                }
            }
        }
    }

    /// Classify one data frame and queue the response.
    async fn dispatch(&self, conn: &Connection, message: Message) -> Result<(), ChannelError> {
        let parsed = match &message {
            Message::Text(text) => InboundEnvelope::parse(text.as_str().as_bytes()),
            Message::Binary(data) => InboundEnvelope::parse(data),
            // Pings are answered by the transport.
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) => return Ok(()),
        };

        match parsed {
            Ok(InboundEnvelope::NewUser) => self.send_snapshot(conn).await,
            Ok(InboundEnvelope::Unknown { tag }) => {
                debug!(conn_id = %conn.id(), ?tag, "Echoing unrecognized message");
                conn.send(message).await
            }
            Err(e) => {
                debug!(conn_id = %conn.id(), error = %e, "Echoing malformed message");
                conn.send(message).await
            }
        }
    }

    /// Answer `NEW_USER` with the current dataset, or an error envelope if
    /// the store is unavailable. Either way the connection stays open.
    async fn send_snapshot(&self, conn: &Connection) -> Result<(), ChannelError> {
        let json = match self.snapshots.fetch_snapshot().await {
            Ok(records) => {
                debug!(conn_id = %conn.id(), count = records.len(), "Sending server snapshot");
                OutboundEnvelope::servers(&records).to_json()
            }
            Err(e) => {
                warn!(conn_id = %conn.id(), error = %e, "Snapshot fetch failed");
                OutboundEnvelope::error(e.code(), e.to_string()).to_json()
            }
        };

        match json {
            Ok(text) => conn.send(Message::Text(text.into())).await,
            Err(e) => {
                error!(conn_id = %conn.id(), error = %e, "Failed to serialize snapshot");
                Ok(())
            }
        }
    }
}

fn close_frame(code: u16, reason: &'static str) -> CloseFrame {
    CloseFrame {
        code,
        reason: reason.into(),
    }
}

/// Mirror the peer's close status; peers that sent none get a normal close.
fn reply_to_peer_close(frame: Option<CloseFrame>) -> CloseFrame {
    frame.unwrap_or_else(|| close_frame(close_code::NORMAL, ""))
}

async fn finish_writer(id: ConnectionId, mut writer: tokio::task::JoinHandle<()>) {
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(conn_id = %id, error = %e, "Writer task failed"),
        Err(_) => {
            warn!(conn_id = %id, "Writer did not drain in time, aborting");
            writer.abort();
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
