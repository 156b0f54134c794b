//! Reference-counted subscription bookkeeping.
//!
//! Many local consumers can subscribe to the same event type; only the
//! 0→1 and 1→0 edges produce wire traffic.

use std::collections::HashMap;

use crate::errors::ClientError;

/// Per-event-type subscription reference counts.
#[derive(Debug, Default)]
pub struct SubscriptionCounts {
    counts: HashMap<String, usize>,
}

impl SubscriptionCounts {
    /// Empty count table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more subscriber for `event_type`.
    ///
    /// Returns `true` on the 0→1 edge, when a subscribe frame must go
    /// out to the server.
    pub fn increment(&mut self, event_type: &str) -> bool {
        let count = self.counts.entry(event_type.to_owned()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Record one subscriber gone for `event_type`.
    ///
    /// Returns `Ok(true)` on the 1→0 edge, when an unsubscribe frame
    /// must go out. Decrementing a type that has no subscribers is a
    /// caller bug and fails with [`ClientError::RefCountUnderflow`];
    /// the count stays at zero.
    pub fn decrement(&mut self, event_type: &str) -> Result<bool, ClientError> {
        match self.counts.get_mut(event_type) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    let _ = self.counts.remove(event_type);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => Err(ClientError::RefCountUnderflow {
                event_type: event_type.to_owned(),
            }),
        }
    }

    /// Current count for `event_type`.
    pub fn count(&self, event_type: &str) -> usize {
        self.counts.get(event_type).copied().unwrap_or(0)
    }

    /// Event types with at least one subscriber.
    pub fn active_types(&self) -> Vec<String> {
        self.counts.keys().cloned().collect()
    }

    /// Number of event types with at least one subscriber.
    pub fn active_len(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_subscribe_is_an_edge() {
        let mut counts = SubscriptionCounts::new();
        assert!(counts.increment("message"));
        assert!(!counts.increment("message"));
        assert_eq!(counts.count("message"), 2);
    }

    #[test]
    fn last_unsubscribe_is_an_edge() {
        let mut counts = SubscriptionCounts::new();
        let _ = counts.increment("message");
        let _ = counts.increment("message");
        assert!(!counts.decrement("message").unwrap());
        assert!(counts.decrement("message").unwrap());
        assert_eq!(counts.count("message"), 0);
    }

    #[test]
    fn underflow_is_an_error() {
        let mut counts = SubscriptionCounts::new();
        let err = counts.decrement("message").unwrap_err();
        assert!(matches!(
            err,
            ClientError::RefCountUnderflow { ref event_type } if event_type == "message"
        ));
        // Count rests at zero afterwards
        assert_eq!(counts.count("message"), 0);
    }

    #[test]
    fn underflow_after_balanced_pair_is_still_an_error() {
        let mut counts = SubscriptionCounts::new();
        let _ = counts.increment("message");
        let _ = counts.decrement("message").unwrap();
        assert!(counts.decrement("message").is_err());
    }

    #[test]
    fn types_counted_independently() {
        let mut counts = SubscriptionCounts::new();
        assert!(counts.increment("message"));
        assert!(counts.increment("connect"));
        assert_eq!(counts.active_len(), 2);
        assert!(counts.decrement("connect").unwrap());
        assert_eq!(counts.active_types(), vec!["message".to_owned()]);
    }

    #[test]
    fn resubscribe_after_drop_is_an_edge_again() {
        let mut counts = SubscriptionCounts::new();
        assert!(counts.increment("message"));
        assert!(counts.decrement("message").unwrap());
        assert!(counts.increment("message"));
    }
}
