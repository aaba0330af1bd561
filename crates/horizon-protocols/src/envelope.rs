//! Wire envelopes exchanged over a client connection.
//!
//! Every message is a JSON object tagged by its `type` field:
//!
//! ```json
//! {"type": "NEW_USER"}
//! {"type": "SERVERS", "payload": [{"Id": "srv-1", "Name": "alpha"}]}
//! {"type": "UPDATE", "payload": {"action": "removed", "id": "srv-1"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::record::ServerRecord;

const NEW_USER_TAG: &str = "NEW_USER";

/// Client to server envelope.
///
/// Anything that is a JSON object but not a `NEW_USER` request maps to
/// [`InboundEnvelope::Unknown`] and is echoed back by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEnvelope {
    /// A client asking for the full server list.
    NewUser,
    /// Any other tag, or no string tag at all.
    Unknown { tag: Option<String> },
}

impl InboundEnvelope {
    /// Classify a raw frame.
    ///
    /// Fails with [`ProtocolError::MalformedMessage`] when the bytes are not a
    /// JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
        let object = value.as_object().ok_or_else(|| {
            ProtocolError::MalformedMessage("expected a JSON object".to_string())
        })?;

        Ok(match object.get("type").and_then(Value::as_str) {
            Some(NEW_USER_TAG) => Self::NewUser,
            Some(other) => Self::Unknown {
                tag: Some(other.to_string()),
            },
            None => Self::Unknown { tag: None },
        })
    }
}

/// Server to client envelope tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeKind {
    /// Full dataset snapshot.
    Servers,
    /// Incremental change.
    Update,
    /// Request could not be served.
    Error,
}

impl EnvelopeKind {
    /// Pick the broadcast tag from the publisher's update flag.
    pub fn from_update_flag(is_update_kind: bool) -> Self {
        if is_update_kind {
            Self::Update
        } else {
            Self::Servers
        }
    }
}

/// Server to client envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope<P> {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub payload: P,
}

impl<P: Serialize> OutboundEnvelope<P> {
    pub fn new(kind: EnvelopeKind, payload: P) -> Self {
        Self { kind, payload }
    }

    pub fn servers(payload: P) -> Self {
        Self::new(EnvelopeKind::Servers, payload)
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl OutboundEnvelope<ErrorPayload> {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            EnvelopeKind::Error,
            ErrorPayload {
                code: code.into(),
                message: message.into(),
            },
        )
    }
}

/// Payload of an `ERROR` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Payload of an `UPDATE` envelope emitted when the server dataset changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerChange {
    /// A server row was inserted or replaced.
    Upserted { server: ServerRecord },
    /// A server row was deleted.
    Removed { id: String },
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
