//! Client error types.

use thiserror::Error;

/// Errors surfaced by [`crate::SocketClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket handshake or transport failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The retry loop exhausted its budget without reconnecting.
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// An unsubscribe was requested for an event type with no active
    /// subscriptions. Indicates a double-close bug in the caller.
    #[error("unsubscribe from '{event_type}' but no subscription is active")]
    RefCountUnderflow {
        /// The affected event type.
        event_type: String,
    },

    /// The background connection task has shut down.
    #[error("connection task is gone")]
    TaskGone,
}
