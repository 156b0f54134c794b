//! Wire-format types for the Pulse WebSocket protocol.
//!
//! Every message on the wire is JSON. Control traffic (subscribe/unsubscribe
//! declarations) travels inside a [`WsEnvelope`] with `event =
//! "subscriptions"`. Published events are sent to clients as a bare
//! [`EventFrame`], not enveloped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;

/// Envelope `event` name used for subscription control frames.
pub const SUBSCRIPTIONS_EVENT: &str = "subscriptions";

/// Well-known event-type tags. Matching is plain string equality; any other
/// published tag is equally valid.
pub mod event_types {
    /// A chat message published through the HTTP endpoint.
    pub const MESSAGE: &str = "message";
    /// A client connected to the gateway.
    pub const CONNECT: &str = "connect";
    /// A client disconnected from the gateway.
    pub const DISCONNECT: &str = "disconnect";
}

/// Wire message wrapper: `{event, data}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WsEnvelope {
    /// Discriminator for the payload (`"subscriptions"` for control frames).
    pub event: String,
    /// Payload; shape depends on `event`.
    pub data: Value,
}

impl WsEnvelope {
    /// Wrap a control frame in the `subscriptions` envelope.
    pub fn subscriptions(frame: &ControlFrame) -> Result<Self, ProtocolError> {
        Ok(Self {
            event: SUBSCRIPTIONS_EVENT.to_owned(),
            data: serde_json::to_value(frame)?,
        })
    }

    /// Whether this envelope carries a subscription control frame.
    #[must_use]
    pub fn is_subscriptions(&self) -> bool {
        self.event == SUBSCRIPTIONS_EVENT
    }

    /// Extract the control frame from a `subscriptions` envelope.
    pub fn control_frame(&self) -> Result<ControlFrame, ProtocolError> {
        if !self.is_subscriptions() {
            return Err(ProtocolError::UnexpectedEvent {
                event: self.event.clone(),
            });
        }
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// One event type or a list of them, as the wire allows both forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTypes {
    /// A single event type.
    One(String),
    /// Several event types, applied independently in order.
    Many(Vec<String>),
}

impl EventTypes {
    /// View the event types as a slice, regardless of wire form.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(t) => std::slice::from_ref(t),
            Self::Many(ts) => ts,
        }
    }

    /// Whether `event_type` is one of the requested types.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.as_slice().iter().any(|t| t == event_type)
    }

    /// Number of types carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether no types are carried (only possible in the list form).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for EventTypes {
    fn from(t: &str) -> Self {
        Self::One(t.to_owned())
    }
}

impl From<Vec<String>> for EventTypes {
    fn from(ts: Vec<String>) -> Self {
        Self::Many(ts)
    }
}

impl From<&[&str]> for EventTypes {
    fn from(ts: &[&str]) -> Self {
        Self::Many(ts.iter().map(|t| (*t).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventTypes {
    fn from(ts: [&str; N]) -> Self {
        Self::Many(ts.iter().map(|t| (*t).to_owned()).collect())
    }
}

/// Subscribe/unsubscribe declaration for one or more event types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFrame {
    /// Event type(s) the declaration covers.
    pub event_type: EventTypes,
    /// `true` to subscribe, `false` to unsubscribe.
    pub is_subscribe: bool,
    /// Client-claimed identity; informational only, the server keys interest
    /// by the physical connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ControlFrame {
    /// Build a subscribe frame for a single event type.
    pub fn subscribe(event_type: impl Into<String>) -> Self {
        Self {
            event_type: EventTypes::One(event_type.into()),
            is_subscribe: true,
            client_id: None,
        }
    }

    /// Build an unsubscribe frame for a single event type.
    pub fn unsubscribe(event_type: impl Into<String>) -> Self {
        Self {
            event_type: EventTypes::One(event_type.into()),
            is_subscribe: false,
            client_id: None,
        }
    }

    /// Attach the client-claimed identity.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// A published event delivered to interested connections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    /// Tag classifying the event.
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub body: Value,
}

impl EventFrame {
    /// Create an event frame.
    pub fn new(event_type: impl Into<String>, body: Value) -> Self {
        Self {
            event_type: event_type.into(),
            body,
        }
    }

    /// Parse an inbound text frame as an event, if it has that shape.
    ///
    /// Frames that are not valid JSON objects with an `eventType` field are
    /// not events and yield `None`; the caller ignores them.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        if value.get("eventType").is_none_or(|t| !t.is_string()) {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
