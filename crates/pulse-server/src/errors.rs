//! Server error types.

use thiserror::Error;

/// Failures while starting or running the gateway.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or accepting on the listen socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
