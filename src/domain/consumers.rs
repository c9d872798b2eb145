//! Built-in event consumers: logging, typing-state tracking, and an
//! async forwarding bridge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::dispatcher::{ConsumerError, EventConsumer};
use super::{ChannelId, EventKind, NormalizedEvent};

/// Writes one structured log line per event.
#[derive(Debug, Default)]
pub struct LoggingConsumer;

impl EventConsumer for LoggingConsumer {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_event(&self, event: &NormalizedEvent) -> Result<(), ConsumerError> {
        let channel_id = event.channel_id.as_str();
        match &event.kind {
            EventKind::MessageAdded | EventKind::MessageUpdated | EventKind::MessageRemoved => {
                let message = event.payload.get("message");
                tracing::debug!(
                    channel_id,
                    kind = %event.kind,
                    message_id = ?message.and_then(|m| m.get("id")),
                    user_id = ?event.user_id(),
                    "message event"
                );
            }
            EventKind::UserTyping | EventKind::UserStoppedTyping => {
                tracing::trace!(channel_id, kind = %event.kind, user_id = ?event.user_id(), "typing");
            }
            EventKind::SubscriptionSucceeded => {
                tracing::info!(channel_id, topic = ?event.topic, "subscription confirmed");
            }
            EventKind::MarkUpdated => {
                tracing::debug!(channel_id, mark = ?event.payload.get("mark"), "mark updated");
            }
            EventKind::Unrecognized(raw) => {
                tracing::debug!(channel_id, kind = raw.as_str(), "unrecognized event");
            }
        }
        Ok(())
    }
}

fn user_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tracks which users are typing in which channel, and since when.
///
/// A user is added on the first `UserTyping` and removed on
/// `UserStoppedTyping` or when a message from them arrives.
#[derive(Debug, Default)]
pub struct TypingTracker {
    typing: Mutex<HashMap<ChannelId, HashMap<String, DateTime<Utc>>>>,
}

impl TypingTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the users typing in `channel_id` with their start times,
    /// sorted by user id.
    #[must_use]
    pub fn typing_in(&self, channel_id: &ChannelId) -> Vec<(String, DateTime<Utc>)> {
        let typing = self.typing.lock();
        let mut users: Vec<(String, DateTime<Utc>)> = typing
            .get(channel_id)
            .map(|m| m.iter().map(|(u, t)| (u.clone(), *t)).collect())
            .unwrap_or_default();
        users.sort_by(|a, b| a.0.cmp(&b.0));
        users
    }

    fn stop(&self, channel_id: &ChannelId, user: &str) -> Option<DateTime<Utc>> {
        let mut typing = self.typing.lock();
        let users = typing.get_mut(channel_id)?;
        let started = users.remove(user);
        if users.is_empty() {
            let _ = typing.remove(channel_id);
        }
        started
    }
}

impl EventConsumer for TypingTracker {
    fn name(&self) -> &str {
        "typing-tracker"
    }

    fn on_event(&self, event: &NormalizedEvent) -> Result<(), ConsumerError> {
        match event.kind {
            EventKind::UserTyping => {
                let user = event.user_id().ok_or("typing event without user_id")?;
                let _ = self
                    .typing
                    .lock()
                    .entry(event.channel_id.clone())
                    .or_default()
                    .entry(user_key(user))
                    .or_insert(event.received_at);
            }
            EventKind::UserStoppedTyping => {
                let user = event.user_id().ok_or("typing event without user_id")?;
                if let Some(started) = self.stop(&event.channel_id, &user_key(user)) {
                    let secs = (event.received_at - started).num_seconds();
                    tracing::trace!(channel_id = %event.channel_id, secs, "user stopped typing");
                }
            }
            EventKind::MessageAdded => {
                if let Some(user) = event.user_id() {
                    let _ = self.stop(&event.channel_id, &user_key(user));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Forwards events into a bounded channel for async consumers.
///
/// Never blocks the publishing session: when the buffer is full the
/// event is dropped and counted.
#[derive(Debug)]
pub struct ChannelForwarder {
    name: String,
    tx: mpsc::Sender<NormalizedEvent>,
    dropped: AtomicU64,
}

impl ChannelForwarder {
    /// Creates a forwarder and the receiving half of its buffer.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<NormalizedEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: name.into(),
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Returns how many events were dropped because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventConsumer for ChannelForwarder {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &NormalizedEvent) -> Result<(), ConsumerError> {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(consumer = %self.name, dropped, "forward buffer full, event dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err("forward receiver dropped".into()),
        }
    }
}
