//! Broadcast fan-out to every open connection.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use serde::Serialize;
use tracing::{debug, error, warn};

use horizon_protocols::{EnvelopeKind, OutboundEnvelope};

use crate::registry::ConnectionRegistry;

/// Outcome of one [`BroadcastPublisher::publish`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections whose outbound queue accepted the frame.
    pub delivered: usize,
    /// Connections skipped because their queue was full or closed.
    pub failed: usize,
}

/// Pushes dataset updates to every open connection.
///
/// Best-effort: each recipient gets at most one attempt, and a failure on one
/// connection never stops delivery to the others or reaches the caller.
#[derive(Clone)]
pub struct BroadcastPublisher {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastPublisher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Wrap `payload` as `UPDATE` (or `SERVERS` when `is_update_kind` is false)
    /// and queue it on every connection open at the time of the call.
    pub fn publish<P>(&self, payload: &P, is_update_kind: bool) -> PublishReport
    where
        P: Serialize + ?Sized,
    {
        let kind = EnvelopeKind::from_update_flag(is_update_kind);
        let text: Utf8Bytes = match OutboundEnvelope::new(kind, payload).to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(kind = ?kind, error = %e, "Failed to serialize broadcast");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        for conn in self.registry.snapshot() {
            // Utf8Bytes clones share one buffer.
            match conn.try_send(Message::Text(text.clone())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(conn_id = %conn.id(), error = %e, "Broadcast send failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            kind = ?kind,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast published"
        );
        report
    }

    /// Publish an `UPDATE` envelope.
    pub fn publish_update<P>(&self, payload: &P) -> PublishReport
    where
        P: Serialize + ?Sized,
    {
        self.publish(payload, true)
    }

    /// Publish a `SERVERS` envelope.
    pub fn publish_servers<P>(&self, payload: &P) -> PublishReport
    where
        P: Serialize + ?Sized,
    {
        self.publish(payload, false)
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
