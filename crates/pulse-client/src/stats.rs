//! Socket statistics shared between the connection task and observers.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

/// Live counters describing the socket's health.
///
/// Updated by the connection task, readable from anywhere. Connection
/// status changes are additionally pushed through a watch channel so
/// observers can await transitions instead of polling.
pub struct SocketStats {
    connected_tx: watch::Sender<bool>,
    connections_tx: watch::Sender<u64>,
    subscription_count: AtomicU64,
    reconnection_tries: AtomicU64,
    messages_received: AtomicU64,
    last_error: Mutex<Option<String>>,
    client_id: Mutex<Option<String>>,
}

impl SocketStats {
    /// New stats block, initially disconnected.
    pub fn new() -> Self {
        let (connected_tx, _) = watch::channel(false);
        let (connections_tx, _) = watch::channel(0);
        Self {
            connected_tx,
            connections_tx,
            subscription_count: AtomicU64::new(0),
            reconnection_tries: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            last_error: Mutex::new(None),
            client_id: Mutex::new(None),
        }
    }

    /// Whether the socket is currently connected.
    pub fn is_connected(&self) -> bool {
        *self.connected_tx.borrow()
    }

    /// Watch connection status transitions.
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        let _ = self.connected_tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
    }

    /// Number of event types with at least one active subscription.
    pub fn subscription_count(&self) -> u64 {
        self.subscription_count.load(Ordering::Relaxed)
    }

    pub(crate) fn set_subscription_count(&self, n: usize) {
        self.subscription_count
            .store(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Times a connection has been established (including reconnects).
    pub fn connections(&self) -> u64 {
        *self.connections_tx.borrow()
    }

    /// Watch the connection counter. Every successful (re)connect bumps it,
    /// so a watcher that was busy during an up-down-up cycle still sees a
    /// change — unlike the boolean status, which coalesces. Collaborators
    /// restoring server-side interest after reconnects hang off this.
    pub fn watch_connections(&self) -> watch::Receiver<u64> {
        self.connections_tx.subscribe()
    }

    pub(crate) fn record_connection(&self) {
        self.connections_tx.send_modify(|n| *n += 1);
    }

    /// Total reconnection attempts made.
    pub fn reconnection_tries(&self) -> u64 {
        self.reconnection_tries.load(Ordering::Relaxed)
    }

    pub(crate) fn record_retry(&self) {
        let _ = self.reconnection_tries.fetch_add(1, Ordering::Relaxed);
    }

    /// Total event frames received and demultiplexed.
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub(crate) fn record_message(&self) {
        let _ = self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recent connection error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn record_error(&self, error: String) {
        *self.last_error.lock() = Some(error);
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    /// The ID the server assigned on the current connection, if known.
    pub fn client_id(&self) -> Option<String> {
        self.client_id.lock().clone()
    }

    pub(crate) fn set_client_id(&self, id: Option<String>) {
        *self.client_id.lock() = id;
    }
}

impl Default for SocketStats {
    fn default() -> Self {
        Self::new()
    }
}
