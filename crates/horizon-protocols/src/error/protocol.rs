//! Top-level protocol error type.

use thiserror::Error;

/// Top-level protocol error type.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_error() {
        let err = ProtocolError::MalformedMessage("expected value".to_string());
        let display = err.to_string();
        assert!(display.contains("Malformed"));
        assert!(display.contains("expected value"));
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ProtocolError::from(json_err);
        assert!(err.to_string().contains("Serialization error"));
    }
}
