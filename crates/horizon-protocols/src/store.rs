//! Dataset store protocol definitions.
//!
//! The real-time core only reads the dataset through [`SnapshotProvider`].
//! Producers that mutate it go through [`ServerStore`].

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::ServerRecord;

/// Source of the full current server dataset.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch every server row.
    ///
    /// No caching or staleness guarantee is expected from implementations.
    async fn fetch_snapshot(&self) -> Result<Vec<ServerRecord>, StoreError>;
}

/// A writable server dataset.
#[async_trait]
pub trait ServerStore: SnapshotProvider {
    /// Insert or replace a row keyed by its `Id`.
    async fn upsert(&self, record: &ServerRecord) -> Result<(), StoreError>;

    /// Delete a row. Returns `false` when no row had that `Id`.
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;
}
