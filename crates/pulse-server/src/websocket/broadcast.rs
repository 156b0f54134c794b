//! Event fan-out to interested WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use pulse_core::protocol::event_types;
use pulse_core::{ControlFrame, EventFrame};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::registry::SubscriptionRegistry;

/// Delivers published events to exactly the connections whose interest set
/// contains the event's type at publish time.
pub struct EventBroadcaster {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Per-connection interest sets.
    registry: SubscriptionRegistry,
    /// Atomic counter tracking total connections (avoids read-locking for
    /// count queries).
    active_count: AtomicUsize,
}

impl EventBroadcaster {
    /// Create a new broadcaster with an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            registry: SubscriptionRegistry::new(),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection and register it for interest tracking.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        self.registry.add_connection(&connection.id);
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection and drop its entire interest set.
    pub async fn remove(&self, connection_id: &str) {
        self.registry.remove_connection(connection_id);
        let mut conns = self.connections.write().await;
        if conns.remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Apply a subscribe/unsubscribe control frame from a connection.
    pub fn apply_control(&self, connection_id: &str, frame: &ControlFrame) {
        let _ = self.registry.apply(connection_id, frame);
    }

    /// Publish an event to every interested connection.
    ///
    /// The frame is serialized once and shared. Each delivery is one
    /// independent send; a full or closed channel on one connection never
    /// blocks or fails delivery to the others. Returns the number of
    /// connections the event was handed to.
    pub async fn publish(&self, event: &EventFrame) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = %event.event_type, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let interested = self.registry.interested(&event.event_type);
        let conns = self.connections.read().await;
        let mut recipients = 0usize;
        for id in &interested {
            let Some(conn) = conns.get(id) else { continue };
            if conn.send(Arc::clone(&json)) {
                recipients += 1;
            } else {
                counter!("ws_broadcast_drops_total").increment(1);
                warn!(
                    conn_id = %conn.id,
                    total_drops = conn.drop_count(),
                    "failed to send event to client (channel full or closed)"
                );
            }
        }
        debug!(
            event_type = %event.event_type,
            interested = interested.len(),
            recipients,
            "broadcast event"
        );
        recipients
    }

    /// Publish the synthetic `connect` event for a newly accepted client.
    pub async fn publish_connect(&self, client_id: &str) -> usize {
        self.publish(&lifecycle_event(event_types::CONNECT, client_id))
            .await
    }

    /// Publish the synthetic `disconnect` event for a departed client.
    pub async fn publish_disconnect(&self, client_id: &str) -> usize {
        self.publish(&lifecycle_event(event_types::DISCONNECT, client_id))
            .await
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// The interest registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `connect`/`disconnect` event naming the client and the time.
fn lifecycle_event(event_type: &str, client_id: &str) -> EventFrame {
    EventFrame::new(
        event_type,
        serde_json::json!({
            "clientId": client_id,
            "at": chrono::Utc::now().to_rfc3339(),
        }),
    )
}
