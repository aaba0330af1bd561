//! WebSocket connection handles.
//!
//! Each [`Connection`] owns a bounded outbound queue drained by exactly one
//! writer task, which is the only code that touches the socket sink. The
//! router's replies and the publisher's broadcasts both go through the queue.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use horizon_protocols::ChannelError;

/// Unique connection identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// A handle to one live client connection.
///
/// Cloning is cheap; all clones share the same queue and state.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    connected_at: DateTime<Utc>,
    state: Arc<RwLock<ConnectionState>>,
    tx: mpsc::Sender<Message>,
}

impl Connection {
    /// Create a connection and spawn the writer task that owns `sink`.
    pub fn spawn<S>(sink: S, queue_capacity: usize) -> (Self, JoinHandle<()>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let conn = Self::from_parts(tx);
        let writer = tokio::spawn(write_outbound(conn.id, sink, rx, conn.state.clone()));
        (conn, writer)
    }

    /// Create a connection whose queue is handed back instead of drained by a writer.
    #[cfg(test)]
    pub(crate) fn detached(queue_capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        (Self::from_parts(tx), rx)
    }

    fn from_parts(tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            connected_at: Utc::now(),
            state: Arc::new(RwLock::new(ConnectionState::Open)),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a frame, waiting for room if the queue is full.
    pub async fn send(&self, message: Message) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Disconnected);
        }

        self.tx.send(message).await.map_err(|_| {
            advance(&self.state, ConnectionState::Closed);
            ChannelError::Disconnected
        })
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, message: Message) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Disconnected);
        }

        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::QueueFull(self.id.to_string()),
            TrySendError::Closed(_) => {
                advance(&self.state, ConnectionState::Closed);
                ChannelError::Disconnected
            }
        })
    }

    /// Start the close handshake by queueing `frame` as the last outbound frame.
    ///
    /// Never waits. If the queue is full (the peer stopped reading) or the
    /// writer is gone, the frame is dropped and the connection goes straight
    /// to `Closed`. Returns `false` if it was already closing or closed.
    pub fn close(&self, frame: CloseFrame) -> bool {
        if !advance(&self.state, ConnectionState::Closing) {
            return false;
        }

        match self.tx.try_send(Message::Close(Some(frame))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(conn_id = %self.id, "Outbound queue full, dropping close frame");
                advance(&self.state, ConnectionState::Closed);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "Writer gone before close frame was queued");
                advance(&self.state, ConnectionState::Closed);
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn mark_closed(&self) {
        advance(&self.state, ConnectionState::Closed);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .field("state", &self.state())
            .finish()
    }
}

/// Move the state forward. Returns `false` if it was already at or past `next`.
fn advance(state: &RwLock<ConnectionState>, next: ConnectionState) -> bool {
    let mut current = state.write();
    if *current >= next {
        return false;
    }
    *current = next;
    true
}

/// Drain the outbound queue into the socket until a close frame is written
/// or the socket fails.
async fn write_outbound<S>(
    id: ConnectionId,
    mut sink: S,
    mut rx: mpsc::Receiver<Message>,
    state: Arc<RwLock<ConnectionState>>,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = rx.recv().await {
        let is_close = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(conn_id = %id, error = %e, "Outbound write failed");
            break;
        }
        if is_close {
            break;
        }
    }

    advance(&state, ConnectionState::Closed);
    rx.close();
    if let Err(e) = sink.close().await {
        trace!(conn_id = %id, error = %e, "Sink close failed");
    }
    debug!(conn_id = %id, "Writer stopped");
}
