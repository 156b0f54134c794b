//! WebSocket connection management, subscription bookkeeping, and event
//! fan-out.
//!
//! ## Data flow
//!
//! `session` owns one client from upgrade to disconnect. Inbound text goes
//! through `handler` to extract control frames, which mutate the per-client
//! interest sets in `registry`. Published events enter through `broadcast`,
//! which looks up interested connections in the registry and delivers one
//! independent send per connection.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod registry;
pub mod session;
