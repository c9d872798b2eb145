//! Relay wire frames.
//!
//! Client-to-relay frames are built from [`OutboundFrame`]; relay-to-client
//! frames are decoded by [`super::codec`].

use serde::{Deserialize, Serialize};

use crate::domain::{SubscriptionToken, TopicName};

/// Literal keepalive probe sent by the relay.
pub const PING_LITERAL: &str = "ping";

/// Literal reply to [`PING_LITERAL`].
pub const PONG_LITERAL: &str = "pong";

/// Event name of the first frame after the transport opens.
pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";

/// JSON-level keepalive request.
pub const PROTOCOL_PING: &str = "pusher:ping";

/// JSON-level keepalive reply.
pub const PROTOCOL_PONG: &str = "pusher:pong";

/// Relay's refusal of a subscribe frame.
pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";

/// `data` of a subscribe frame.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeData {
    /// Topic to join.
    pub channel: String,
    /// Signed subscription token.
    pub auth: String,
}

/// `data` of an unsubscribe frame.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeData {
    /// Topic to leave.
    pub channel: String,
}

/// Frames the client sends to the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum OutboundFrame {
    /// `{"event":"pusher:subscribe","data":{"channel":..,"auth":..}}`
    #[serde(rename = "pusher:subscribe")]
    Subscribe {
        /// Topic and token.
        data: SubscribeData,
    },
    /// `{"event":"pusher:unsubscribe","data":{"channel":..}}`
    #[serde(rename = "pusher:unsubscribe")]
    Unsubscribe {
        /// Topic.
        data: UnsubscribeData,
    },
    /// `{"event":"pusher:ping"}`
    #[serde(rename = "pusher:ping")]
    Ping,
    /// `{"event":"pusher:pong"}`
    #[serde(rename = "pusher:pong")]
    Pong,
}

impl OutboundFrame {
    /// Builds the subscribe frame for `topic`.
    #[must_use]
    pub fn subscribe(topic: &TopicName, token: &SubscriptionToken) -> Self {
        Self::Subscribe {
            data: SubscribeData {
                channel: topic.as_str().to_string(),
                auth: token.as_str().to_string(),
            },
        }
    }

    /// Builds the unsubscribe frame for `topic`.
    #[must_use]
    pub fn unsubscribe(topic: &TopicName) -> Self {
        Self::Unsubscribe {
            data: UnsubscribeData {
                channel: topic.as_str().to_string(),
            },
        }
    }

    /// Serializes the frame to its wire text.
    #[must_use]
    pub fn to_text(&self) -> String {
        // Serializing these shapes cannot fail: all keys are strings.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decoded `data` of the connection-established frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionEstablished {
    /// Transport session id assigned by the relay.
    pub socket_id: String,
    /// Seconds of inactivity after which the relay expects a ping.
    #[serde(default)]
    pub activity_timeout: Option<u64>,
}
