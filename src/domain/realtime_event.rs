//! Normalized realtime events.
//!
//! Every application frame from the relay is turned into a
//! [`NormalizedEvent`] by [`crate::relay::codec`] and handed to the
//! [`super::Dispatcher`]. Events are never mutated after creation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::ChannelId;

/// Kind of a realtime event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A message was posted.
    MessageAdded,
    /// A message was edited.
    MessageUpdated,
    /// A message was deleted.
    MessageRemoved,
    /// A read marker moved.
    MarkUpdated,
    /// A user started or continues typing.
    UserTyping,
    /// A user stopped typing.
    UserStoppedTyping,
    /// The relay confirmed the subscription.
    SubscriptionSucceeded,
    /// Any event name without a mapping, with namespaces stripped.
    Unrecognized(String),
}

impl EventKind {
    /// Returns the canonical name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MessageAdded => "MessageAdded",
            Self::MessageUpdated => "MessageUpdated",
            Self::MessageRemoved => "MessageRemoved",
            Self::MarkUpdated => "MarkUpdated",
            Self::UserTyping => "UserTyping",
            Self::UserStoppedTyping => "UserStoppedTyping",
            Self::SubscriptionSucceeded => "SubscriptionSucceeded",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Returns `true` for the two typing-indicator kinds.
    #[must_use]
    pub const fn is_typing(&self) -> bool {
        matches!(self, Self::UserTyping | Self::UserStoppedTyping)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A decoded relay event tagged with the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    /// Event kind.
    #[serde(rename = "event")]
    pub kind: EventKind,
    /// Channel (bubble) the session that received it is bound to.
    #[serde(rename = "bubble_id")]
    pub channel_id: ChannelId,
    /// Topic named in the frame, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Decoded `data` object.
    pub payload: Map<String, Value>,
    /// When the frame was read off the transport.
    pub received_at: DateTime<Utc>,
}

impl NormalizedEvent {
    /// Returns the `user_id` carried by typing and mark events, or the
    /// author id of a message event.
    #[must_use]
    pub fn user_id(&self) -> Option<&Value> {
        self.payload.get("user_id").or_else(|| {
            self.payload
                .get("message")
                .and_then(|m| m.get("user_id").or_else(|| m.get("user").and_then(|u| u.get("id"))))
        })
    }
}
