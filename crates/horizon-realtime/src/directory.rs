//! Write path for the server dataset.
//!
//! Every successful mutation is followed by a broadcast so connected
//! dashboards stay in sync without polling.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use horizon_protocols::{ServerChange, ServerRecord, ServerStore, StoreError};

use crate::publisher::{BroadcastPublisher, PublishReport};

/// Mutates the server store and announces each change.
pub struct ServerDirectory {
    store: Arc<dyn ServerStore>,
    publisher: BroadcastPublisher,
}

impl ServerDirectory {
    pub fn new(store: Arc<dyn ServerStore>, publisher: BroadcastPublisher) -> Self {
        Self { store, publisher }
    }

    /// Insert or replace a server, then broadcast `UPDATE` with the new row.
    pub async fn upsert(&self, server: ServerRecord) -> Result<PublishReport, StoreError> {
        self.store.upsert(&server).await?;
        info!(server_id = server.id().unwrap_or_default(), "Server upserted");

        Ok(self
            .publisher
            .publish_update(&ServerChange::Upserted { server }))
    }

    /// Delete a server, then broadcast `UPDATE` with its ID.
    ///
    /// Returns `None` (and broadcasts nothing) when no such server existed.
    pub async fn remove(&self, id: &str) -> Result<Option<PublishReport>, StoreError> {
        if !self.store.remove(id).await? {
            debug!(server_id = id, "Remove of unknown server ignored");
            return Ok(None);
        }
        info!(server_id = id, "Server removed");

        Ok(Some(self.publisher.publish_update(&ServerChange::Removed {
            id: id.to_string(),
        })))
    }

    /// Re-read the whole dataset and broadcast it as `SERVERS`.
    pub async fn resync(&self) -> Result<PublishReport, StoreError> {
        let servers = self.store.fetch_snapshot().await?;
        debug!(count = servers.len(), "Broadcasting full server list");
        Ok(self.publisher.publish_servers(&servers))
    }

    /// Resync each time `triggers` yields, until it ends or `shutdown` fires.
    ///
    /// Lets the dataset be edited outside the process (for example with the
    /// `sqlite3` shell) and pushed to clients on demand.
    pub async fn resync_on<T>(&self, mut triggers: T, shutdown: CancellationToken)
    where
        T: Stream + Unpin,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = triggers.next() => next,
            };
            if next.is_none() {
                break;
            }

            match self.resync().await {
                Ok(report) => info!(
                    delivered = report.delivered,
                    failed = report.failed,
                    "Server list resynced"
                ),
                Err(e) => warn!(error = %e, "Resync failed"),
            }
        }
        debug!("Resync loop stopped");
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
