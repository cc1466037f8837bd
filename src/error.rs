//! Error types shared by the store, channel layer, connections and publisher.

use thiserror::Error;

/// Crate error type
#[derive(Debug, Error)]
pub enum Error {
    /// Anonymous identity tried to open a connection
    #[error("connection rejected: anonymous identity")]
    AuthRejected,

    /// SharedStore read or write failed
    #[error("shared store unavailable: {0}")]
    StoreUnavailable(String),

    /// A single member could not receive an event
    #[error("delivery to connection {connection_id} failed: {reason}")]
    DeliveryFailure {
        connection_id: String,
        reason: String,
    },

    /// Client went away or sent something the transport could not handle
    #[error("transport error: {0}")]
    Transport(String),

    /// Cross-process pub/sub backend failed
    #[error("channel layer error: {0}")]
    ChannelLayer(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crate operations
pub type Result<T> = std::result::Result<T, Error>;
