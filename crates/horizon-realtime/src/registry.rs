//! Registry of live client connections.
//!
//! Uses `DashMap` so the router tasks and the broadcast publisher can add,
//! remove and enumerate connections concurrently without a global lock.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use horizon_protocols::ChannelError;

use crate::connection::{Connection, ConnectionId};

/// Thread-safe set of active connections.
///
/// A connection appears at most once, and is removed at most once.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection.
    ///
    /// Fails with [`ChannelError::DuplicateConnection`] if its ID is already present.
    pub fn add(&self, conn: Connection) -> Result<(), ChannelError> {
        match self.connections.entry(conn.id()) {
            Entry::Occupied(_) => Err(ChannelError::DuplicateConnection(conn.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(conn);
                Ok(())
            }
        }
    }

    /// Deregister a connection. Removing an absent connection is a no-op.
    ///
    /// Returns the removed connection if it was present.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    /// Point-in-time copy of the connections that are still open.
    ///
    /// The copy holds no shard locks, so callers may await on sends while
    /// other tasks keep mutating the registry.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered connections, including ones mid-close.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of registered connections that are open.
    pub fn open_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_open())
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
