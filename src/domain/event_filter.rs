//! Per-subscription event filtering.
//!
//! An [`EventFilter`] decides which [`NormalizedEvent`]s a consumer
//! registered with the [`super::Dispatcher`] gets to see.

use std::fmt;
use std::sync::Arc;

use super::{ChannelId, EventKind, NormalizedEvent};

/// Predicate type accepted by [`EventFilter::Predicate`].
pub type EventPredicate = Arc<dyn Fn(&NormalizedEvent) -> bool + Send + Sync>;

/// Selects the events a consumer receives.
#[derive(Clone, Default)]
pub enum EventFilter {
    /// Every event from every channel.
    #[default]
    All,
    /// Events from one channel only.
    Channel(ChannelId),
    /// Events of the listed kinds, from any channel.
    Kinds(Vec<EventKind>),
    /// Events for which the predicate returns `true`.
    Predicate(EventPredicate),
}

impl EventFilter {
    /// Builds a predicate filter from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&NormalizedEvent) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Returns `true` if `event` passes the filter.
    #[must_use]
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        match self {
            Self::All => true,
            Self::Channel(id) => event.channel_id == *id,
            Self::Kinds(kinds) => kinds.contains(&event.kind),
            Self::Predicate(f) => f(event),
        }
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Channel(id) => f.debug_tuple("Channel").field(id).finish(),
            Self::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
