//! # pulse-server
//!
//! The Pulse gateway: an axum HTTP + WebSocket server that tracks, per
//! connected client, which event types it wants, and fans published events
//! out to exactly the interested connections.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `websocket::connection` | Per-client send channel and liveness state |
//! | `websocket::registry` | Per-connection event-type interest sets |
//! | `websocket::broadcast` | Event fan-out to interested connections |
//! | `websocket::handler` | Inbound frame parsing and classification |
//! | `websocket::session` | Upgrade-to-disconnect lifecycle for one client |
//! | `server` | Router, HTTP endpoints, listener |
//! | `shutdown` | Cancellation-token shutdown coordination |

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;
