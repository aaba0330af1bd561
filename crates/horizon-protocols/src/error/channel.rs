//! Connection and registry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connection already registered: {0}")]
    DuplicateConnection(String),

    #[error("Outbound queue full for connection {0}")]
    QueueFull(String),

    #[error("Connection disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_connection_error() {
        let err = ChannelError::DuplicateConnection("conn-1".to_string());
        let display = err.to_string();
        assert!(display.contains("already registered"));
        assert!(display.contains("conn-1"));
    }

    #[test]
    fn test_queue_full_error() {
        let err = ChannelError::QueueFull("conn-2".to_string());
        let display = err.to_string();
        assert!(display.contains("queue full"));
        assert!(display.contains("conn-2"));
    }

    #[test]
    fn test_disconnected_error() {
        let err = ChannelError::Disconnected;
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<ChannelError> = vec![
            ChannelError::DuplicateConnection("a".to_string()),
            ChannelError::QueueFull("d".to_string()),
            ChannelError::Disconnected,
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
