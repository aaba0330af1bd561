//! Dataset store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Stable machine-readable code, used in error envelopes sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) | Self::Query(_) => "STORE_UNAVAILABLE",
            Self::InvalidRecord(_) => "INVALID_RECORD",
        }
    }
}
