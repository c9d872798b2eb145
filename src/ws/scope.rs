//! Per-connection channel scope.
//!
//! Tracks which channels a bridge client wants events for. The scope is
//! read by the dispatcher filter on every publish, so it sits behind a
//! lock shared with the connection loop.

use std::collections::HashSet;

use crate::domain::ChannelId;

/// Wildcard accepted in subscribe commands.
pub const ALL_CHANNELS: &str = "*";

/// The set of channels a bridge client is subscribed to.
#[derive(Debug, Default)]
pub struct ChannelScope {
    channels: HashSet<ChannelId>,
    all: bool,
}

impl ChannelScope {
    /// Creates a scope that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope that matches every channel.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            channels: HashSet::new(),
            all: true,
        }
    }

    /// Creates a scope from an optional `?channel=` query value.
    #[must_use]
    pub fn from_query(channel: Option<&str>) -> Self {
        match channel {
            Some(id) if !id.is_empty() && id != ALL_CHANNELS => {
                let mut scope = Self::new();
                scope.subscribe(&[ChannelId::from(id)]);
                scope
            }
            _ => Self::everything(),
        }
    }

    /// Adds channels. `"*"` turns on the wildcard.
    pub fn subscribe(&mut self, ids: &[ChannelId]) {
        for id in ids {
            if id.as_str() == ALL_CHANNELS {
                self.all = true;
            } else {
                let _ = self.channels.insert(id.clone());
            }
        }
    }

    /// Removes channels. `"*"` turns off the wildcard.
    pub fn unsubscribe(&mut self, ids: &[ChannelId]) {
        for id in ids {
            if id.as_str() == ALL_CHANNELS {
                self.all = false;
            } else {
                let _ = self.channels.remove(id);
            }
        }
    }

    /// Returns `true` if events from `channel_id` should be forwarded.
    #[must_use]
    pub fn matches(&self, channel_id: &ChannelId) -> bool {
        self.all || self.channels.contains(channel_id)
    }

    /// Returns the explicitly subscribed channels, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut ids: Vec<_> = self.channels.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns `true` if the wildcard is active.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.all
    }
}
