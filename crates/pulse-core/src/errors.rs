//! Wire-level error types.

use thiserror::Error;

/// Failure while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An envelope carried an event name the caller did not expect.
    #[error("unexpected envelope event: {event}")]
    UnexpectedEvent {
        /// The envelope's `event` field.
        event: String,
    },
}
