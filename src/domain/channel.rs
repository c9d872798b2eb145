//! Channel descriptors and relay topic names.

use std::fmt;

use serde::Serialize;

use super::ChannelId;

/// Prefix of every private bubble topic on the relay.
pub const BUBBLE_TOPIC_PREFIX: &str = "private-bubble";

/// A channel id together with the secret needed to address its topic.
///
/// Resolved once from the [`super::ChannelDirectory`] when a session is
/// started and immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Bubble identifier.
    pub channel_id: ChannelId,
    channel_secret: String,
}

impl ChannelDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(channel_id: ChannelId, channel_secret: impl Into<String>) -> Self {
        Self {
            channel_id,
            channel_secret: channel_secret.into(),
        }
    }

    /// Returns the fully-qualified relay topic,
    /// `private-bubble.<channel_id>.<channel_secret>`.
    #[must_use]
    pub fn topic_name(&self) -> TopicName {
        TopicName(format!(
            "{BUBBLE_TOPIC_PREFIX}.{}.{}",
            self.channel_id, self.channel_secret
        ))
    }
}

/// Fully-qualified name of a relay topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TopicName(String);

impl TopicName {
    /// Wraps an already-qualified topic name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signed credential authorizing one socket to subscribe to one topic.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    /// Wraps a token string returned by the backend.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubscriptionToken(..)")
    }
}
