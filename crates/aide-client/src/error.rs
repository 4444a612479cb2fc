//! Error types for the backend adapter.

use thiserror::Error;

/// Failures crossing the transport/API boundary. Everything the reducer
/// consumes is converted before it gets there; these errors stay inside
/// the adapter and its callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket-level failure
    #[error("Socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend rejected the request with a detail message
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Credential could not be supplied or applied
    #[error("Authentication error: {0}")]
    Auth(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
