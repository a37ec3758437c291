//! Application Error Types
//!
//! Centralized error handling for the store layer and the protocol client.

/// Application error type for store, configuration and worker failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Protocol client error taxonomy.
///
/// Only `Transport`, `Liveness` and `Disconnected` are fatal to a session; decode
/// failures are always recovered where they happen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Socket-level failure or close.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed frame or push payload.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Non-zero error code in a reply.
    #[error("{service}.{method} failed: code={code} {message}")]
    Remote {
        service: String,
        method: String,
        code: i64,
        message: String,
    },

    /// No reply within the deadline.
    #[error("Request timed out: {method} (seq={seq})")]
    Timeout { method: String, seq: u64 },

    /// Call attempted while the session is not ready.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Heartbeat miss threshold exceeded.
    #[error("Connection timeout, pending requests cleared")]
    Liveness,

    /// The session went away while the request was pending.
    #[error("Session disconnected")]
    Disconnected,

    #[error("Session already connected")]
    AlreadyConnected,
}

impl ProtocolError {
    /// Whether this error ends the session it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Transport(_) | ProtocolError::Liveness | ProtocolError::Disconnected
        )
    }
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(err: prost::DecodeError) -> Self {
        ProtocolError::Decode(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ProtocolError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ProtocolError::Transport(err.to_string())
    }
}
