//! # Horizon Realtime
//!
//! Live push channel for the Horizon dashboard.
//!
//! This crate:
//! - Accepts WebSocket upgrades on any path and keeps a registry of open connections
//! - Answers `NEW_USER` requests with the current server list and echoes everything else
//! - Fans dataset updates out to every open connection through [`BroadcastPublisher`]
//!
//! ## Usage
//!
//! ```ignore
//! use horizon_realtime::{RealtimeServer, RealtimeState};
//!
//! let state = Arc::new(RealtimeState::new(store.clone(), config.realtime.clone()));
//! let server = RealtimeServer::new(state.clone());
//! tokio::spawn(async move { server.run(listener).await });
//!
//! // Elsewhere, after the dataset changes:
//! state.publisher.publish_update(&change);
//! ```

mod connection;
mod directory;
mod publisher;
mod registry;
mod router;
mod server;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use horizon_protocols::SnapshotProvider;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use directory::ServerDirectory;
pub use horizon_config::RealtimeConfig;
pub use publisher::{BroadcastPublisher, PublishReport};
pub use registry::ConnectionRegistry;
pub use router::{DEFAULT_QUEUE_CAPACITY, MessageRouter};
pub use server::{RealtimeServer, create_router};

/// State shared by the upgrade endpoint and every connection task.
pub struct RealtimeState {
    /// Open connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out to every open connection.
    pub publisher: BroadcastPublisher,
    /// Per-connection receive loop.
    pub router: MessageRouter,
    /// Queue and message size limits.
    pub config: RealtimeConfig,
    /// Cancelled once when the process starts shutting down.
    pub shutdown: CancellationToken,
    /// Upgraded socket sessions still running.
    pub sessions: TaskTracker,
}

impl RealtimeState {
    /// Create state with its own shutdown token.
    pub fn new(snapshots: Arc<dyn SnapshotProvider>, config: RealtimeConfig) -> Self {
        Self::with_shutdown(snapshots, config, CancellationToken::new())
    }

    /// Create state bound to an existing shutdown token.
    pub fn with_shutdown(
        snapshots: Arc<dyn SnapshotProvider>,
        config: RealtimeConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(registry.clone(), snapshots, shutdown.clone())
            .with_queue_capacity(config.outbound_queue_capacity);

        Self {
            publisher: BroadcastPublisher::new(registry.clone()),
            registry,
            router,
            config,
            shutdown,
            sessions: TaskTracker::new(),
        }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.registry.open_count()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
