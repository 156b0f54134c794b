//! Reconnecting WebSocket client with ref-counted event subscriptions.
//!
//! A [`SocketClient`] spawns one background task that owns the socket and
//! all mutable state. Consumers call [`SocketClient::subscribe`] with one
//! event type or a set of them to get an [`EventStream`] of matching
//! frames; subscribe/unsubscribe traffic only goes to the server on the
//! first and last local subscriber for a type. Any close, voluntary or
//! not, schedules a reconnect one retry interval later until a budget
//! runs out, and queued control frames survive the gap.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Connection and retry configuration |
//! | [`counts`] | Per-type subscription ref-counting |
//! | [`errors`] | Error types |
//! | [`queue`] | FIFO outbound control-frame queue |
//! | [`socket`] | Public handle and subscription streams |
//! | [`stats`] | Live socket statistics |

#![deny(unsafe_code)]

pub mod config;
pub mod counts;
pub mod errors;
pub mod queue;
pub mod socket;
pub mod stats;

mod task;

pub use config::ClientConfig;
pub use errors::ClientError;
pub use socket::{EventStream, SocketClient};
pub use stats::SocketStats;
