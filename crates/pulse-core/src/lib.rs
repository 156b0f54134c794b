//! # pulse-core
//!
//! Wire protocol types shared by the Pulse client and server:
//!
//! - [`protocol::WsEnvelope`]: the `{event, data}` wrapper for control traffic
//! - [`protocol::ControlFrame`]: subscribe/unsubscribe declarations
//! - [`protocol::EventFrame`]: published events delivered to subscribers
//! - [`errors::ProtocolError`]: wire-level failures

#![deny(unsafe_code)]

pub mod errors;
pub mod protocol;

pub use errors::ProtocolError;
pub use protocol::{ControlFrame, EventFrame, EventTypes, WsEnvelope};
