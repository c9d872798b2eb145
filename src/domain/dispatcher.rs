//! Fan-out of normalized events to registered consumers.
//!
//! [`Dispatcher`] holds a list of registrations, each pairing an
//! [`EventConsumer`] with an [`EventFilter`]. Sessions call
//! [`Dispatcher::publish`] from their own receive loop, so events from
//! one channel reach consumers in wire order. A consumer that fails or
//! panics is logged and skipped; it never reaches the publishing session.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use super::{EventFilter, NormalizedEvent};

/// Error type returned by consumers.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives events from the [`Dispatcher`].
///
/// Called synchronously from a session's receive loop; implementations
/// must not block. Hand work off to a task (see
/// [`super::consumers::ChannelForwarder`]) if it can take time.
pub trait EventConsumer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Any error is logged by the dispatcher and otherwise ignored.
    fn on_event(&self, event: &NormalizedEvent) -> Result<(), ConsumerError>;
}

/// Adapts a closure into an [`EventConsumer`].
pub struct FnConsumer<F> {
    name: String,
    f: F,
}

impl<F> FnConsumer<F>
where
    F: Fn(&NormalizedEvent) -> Result<(), ConsumerError> + Send + Sync,
{
    /// Wraps `f` under the given name.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EventConsumer for FnConsumer<F>
where
    F: Fn(&NormalizedEvent) -> Result<(), ConsumerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &NormalizedEvent) -> Result<(), ConsumerError> {
        (self.f)(event)
    }
}

impl<F> fmt::Debug for FnConsumer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConsumer").field("name", &self.name).finish()
    }
}

/// Handle returned by [`Dispatcher::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionHandle(uuid::Uuid);

impl SubscriptionHandle {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Registration {
    handle: SubscriptionHandle,
    filter: EventFilter,
    consumer: Arc<dyn EventConsumer>,
    failures: AtomicU64,
}

/// Outcome of one [`Dispatcher::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Consumers that handled the event.
    pub delivered: usize,
    /// Consumers that returned an error or panicked.
    pub failed: usize,
}

/// Registry of event consumers.
///
/// Cheap to clone; all clones share the same registrations.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registrations: Arc<RwLock<Vec<Arc<Registration>>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no consumers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a consumer for every event.
    pub fn subscribe(&self, consumer: Arc<dyn EventConsumer>) -> SubscriptionHandle {
        self.subscribe_filtered(consumer, EventFilter::All)
    }

    /// Registers a consumer for events passing `filter`.
    pub fn subscribe_filtered(
        &self,
        consumer: Arc<dyn EventConsumer>,
        filter: EventFilter,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new();
        tracing::debug!(%handle, consumer = consumer.name(), ?filter, "consumer subscribed");
        self.registrations.write().push(Arc::new(Registration {
            handle,
            filter,
            consumer,
            failures: AtomicU64::new(0),
        }));
        handle
    }

    /// Removes a registration. Returns `false` if the handle is unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut regs = self.registrations.write();
        let before = regs.len();
        regs.retain(|r| r.handle != handle);
        let removed = regs.len() != before;
        if removed {
            tracing::debug!(%handle, "consumer unsubscribed");
        }
        removed
    }

    /// Delivers `event` to every matching consumer, in registration order.
    ///
    /// Consumers run outside the registration lock, so a consumer may
    /// subscribe or unsubscribe from inside its callback.
    pub fn publish(&self, event: &NormalizedEvent) -> PublishReport {
        let targets: Vec<Arc<Registration>> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.filter.matches(event))
            .map(Arc::clone)
            .collect();

        let mut report = PublishReport::default();
        for reg in targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| reg.consumer.on_event(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    let _ = reg.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        consumer = reg.consumer.name(),
                        channel_id = %event.channel_id,
                        kind = %event.kind,
                        error = %err,
                        "consumer failed"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    let _ = reg.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        consumer = reg.consumer.name(),
                        channel_id = %event.channel_id,
                        kind = %event.kind,
                        "consumer panicked"
                    );
                }
            }
        }
        report
    }

    /// Returns how many times the consumer behind `handle` has failed.
    #[must_use]
    pub fn failure_count(&self, handle: SubscriptionHandle) -> Option<u64> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.handle == handle)
            .map(|r| r.failures.load(Ordering::Relaxed))
    }

    /// Returns the number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.registrations.read().len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("consumers", &self.consumer_count())
            .finish()
    }
}
