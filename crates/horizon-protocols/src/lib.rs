//! # Horizon Protocols
//!
//! Shared definitions for the Horizon real-time core.
//! Contains only types and traits - no transport or storage implementations.
//!
//! ## Contents
//!
//! - [`InboundEnvelope`] / [`OutboundEnvelope`] - the tagged JSON messages on the wire
//! - [`ServerRecord`] - one row of the server dataset
//! - [`SnapshotProvider`] / [`ServerStore`] - the dataset contract the core consumes

pub mod envelope;
pub mod error;
pub mod record;
pub mod store;

pub use envelope::{EnvelopeKind, ErrorPayload, InboundEnvelope, OutboundEnvelope, ServerChange};
pub use error::{ChannelError, ProtocolError, StoreError};
pub use record::ServerRecord;
pub use store::{ServerStore, SnapshotProvider};
