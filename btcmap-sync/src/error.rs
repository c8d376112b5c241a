//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error (connection, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status after retries were exhausted.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable cache error.
    #[error("storage error: {0}")]
    Storage(#[from] btcmap_storage::StorageError),

    /// A cold start received no records at all.
    #[error("{collection}: remote API returned no records")]
    EmptyResult { collection: String },

    /// A full page did not move the `updated_since` cursor forward.
    #[error("{collection}: cursor stalled at {cursor}")]
    CursorStalled { collection: String, cursor: String },

    /// The overall sync deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Returns true for errors raised by the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Http { .. } | SyncError::Timeout
        )
    }
}
