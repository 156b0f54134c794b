//! Inbound frame parsing — classifies raw text from a client.

use pulse_core::{ControlFrame, WsEnvelope};
use tracing::{debug, warn};

/// Parse an inbound text frame into a control frame, if it is one.
///
/// Anything else — invalid JSON, an envelope with an unknown `event`, or a
/// malformed `subscriptions` payload — is logged and ignored; it never
/// terminates the session.
#[must_use]
pub fn parse_control_frame(text: &str) -> Option<ControlFrame> {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(_) => {
            warn!("ignoring non-envelope frame");
            return None;
        }
    };

    if !envelope.is_subscriptions() {
        debug!(event = %envelope.event, "ignoring envelope with unknown event");
        return None;
    }

    match envelope.control_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "ignoring malformed subscriptions frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_frame() {
        let text = r#"{"event":"subscriptions","data":{"eventType":"message","isSubscribe":true}}"#;
        let frame = parse_control_frame(text).unwrap();
        assert!(frame.is_subscribe);
        assert!(frame.event_type.contains("message"));
    }

    #[test]
    fn parses_unsubscribe_with_type_list() {
        let text = r#"{"event":"subscriptions","data":{"eventType":["connect","disconnect"],"isSubscribe":false}}"#;
        let frame = parse_control_frame(text).unwrap();
        assert!(!frame.is_subscribe);
        assert_eq!(frame.event_type.len(), 2);
    }

    #[test]
    fn parses_client_id() {
        let text = r#"{"event":"subscriptions","data":{"eventType":"message","isSubscribe":true,"clientId":"c9"}}"#;
        let frame = parse_control_frame(text).unwrap();
        assert_eq!(frame.client_id.as_deref(), Some("c9"));
    }

    #[test]
    fn ignores_invalid_json() {
        assert!(parse_control_frame("not json at all").is_none());
        assert!(parse_control_frame("").is_none());
    }

    #[test]
    fn ignores_unknown_envelope_event() {
        let text = r#"{"event":"chat","data":{"text":"hi"}}"#;
        assert!(parse_control_frame(text).is_none());
    }

    #[test]
    fn ignores_malformed_subscriptions_payload() {
        let text = r#"{"event":"subscriptions","data":{"isSubscribe":"yes"}}"#;
        assert!(parse_control_frame(text).is_none());
    }

    #[test]
    fn ignores_non_object_frames() {
        assert!(parse_control_frame("[1,2,3]").is_none());
        assert!(parse_control_frame("42").is_none());
    }
}
