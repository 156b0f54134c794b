//! Per-connection subscription interest tracking.
//!
//! A connection appears in the registry for an event type iff it has sent a
//! subscribe control frame for that type and no matching unsubscribe has
//! been processed since. The whole interest set drops as a unit when the
//! connection closes.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use pulse_core::ControlFrame;
use tracing::debug;

/// Tracks which event types each connection wants.
#[derive(Default)]
pub struct SubscriptionRegistry {
    /// Interest sets keyed by connection ID.
    interests: RwLock<HashMap<String, HashSet<String>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with an empty interest set.
    pub fn add_connection(&self, connection_id: &str) {
        let _ = self
            .interests
            .write()
            .entry(connection_id.to_owned())
            .or_default();
    }

    /// Drop a connection's entire interest set.
    pub fn remove_connection(&self, connection_id: &str) {
        let _ = self.interests.write().remove(connection_id);
    }

    /// Apply a control frame for a connection.
    ///
    /// Each type in the frame is applied independently, in order. Both
    /// subscribe and unsubscribe are idempotent. Returns `false` if the
    /// connection is not registered (already closed), in which case the
    /// frame is unreachable and ignored.
    pub fn apply(&self, connection_id: &str, frame: &ControlFrame) -> bool {
        let mut interests = self.interests.write();
        let Some(set) = interests.get_mut(connection_id) else {
            debug!(connection_id, "control frame for unknown connection ignored");
            return false;
        };

        for event_type in frame.event_type.as_slice() {
            if frame.is_subscribe {
                let _ = set.insert(event_type.clone());
            } else {
                let _ = set.remove(event_type);
            }
        }
        debug!(
            connection_id,
            is_subscribe = frame.is_subscribe,
            types = frame.event_type.len(),
            "applied control frame"
        );
        true
    }

    /// Connection IDs currently interested in `event_type`.
    pub fn interested(&self, event_type: &str) -> Vec<String> {
        self.interests
            .read()
            .iter()
            .filter(|(_, set)| set.contains(event_type))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether a connection is interested in `event_type`.
    pub fn is_interested(&self, connection_id: &str, event_type: &str) -> bool {
        self.interests
            .read()
            .get(connection_id)
            .is_some_and(|set| set.contains(event_type))
    }

    /// The event types a connection currently wants (empty if unknown).
    pub fn types_for(&self, connection_id: &str) -> Vec<String> {
        self.interests
            .read()
            .get(connection_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.interests.read().len()
    }
}
