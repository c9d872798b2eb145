//! Domain layer: identifiers, events, the dispatcher, and channel lookup.
//!
//! This module holds everything that does not touch the network: channel
//! identity and topic naming, session states, the normalized event model,
//! the [`Dispatcher`] that fans events out to consumers, and the
//! [`ChannelDirectory`] seam onto the cached bubble metadata.

pub mod channel;
pub mod channel_id;
pub mod consumers;
pub mod directory;
pub mod dispatcher;
pub mod event_filter;
pub mod realtime_event;
pub mod session_state;

pub use channel::{ChannelDescriptor, SubscriptionToken, TopicName};
pub use channel_id::ChannelId;
pub use consumers::{ChannelForwarder, LoggingConsumer, TypingTracker};
pub use directory::{BubbleCacheDirectory, ChannelDirectory, StaticChannelDirectory};
pub use dispatcher::{
    ConsumerError, Dispatcher, EventConsumer, FnConsumer, PublishReport, SubscriptionHandle,
};
pub use event_filter::EventFilter;
pub use realtime_event::{EventKind, NormalizedEvent};
pub use session_state::{SessionState, Termination};
