//! Per-channel session tracking.
//!
//! [`SessionRegistry`] is the only writer of the channel → session map.
//! Each tracked session runs as its own task; when the task ends it removes
//! its own entry (unless a newer session already replaced it) and records
//! how it ended.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::domain::{ChannelDirectory, ChannelId, SessionState, Termination};
use crate::error::RealtimeError;
use crate::relay::{SessionDeps, SessionHandle, SocketSession};

/// How long `disconnect` waits for a session task before aborting it.
const STOP_GRACE: Duration = Duration::from_secs(5);

struct TrackedSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<ChannelId, TrackedSession>,
    terminations: HashMap<ChannelId, Termination>,
}

/// Control surface over the running sessions.
///
/// # Concurrency
///
/// The map sits behind one [`tokio::sync::RwLock`]. Lookups take the read
/// lock; connect, disconnect, and task exit take the write lock. No lock is
/// held while a session task is awaited.
pub struct SessionRegistry {
    directory: Arc<dyn ChannelDirectory>,
    deps: SessionDeps,
    state: Arc<RwLock<RegistryState>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(directory: Arc<dyn ChannelDirectory>, deps: SessionDeps) -> Self {
        Self {
            directory,
            deps,
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Starts a session for `channel_id` unless a live one already exists.
    ///
    /// Returns the session's current state. Calling this again while the
    /// session is not terminated returns that session's state and starts
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UnknownChannel`] if no secret is known for
    /// the channel.
    pub async fn connect(&self, channel_id: ChannelId) -> Result<SessionState, RealtimeError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.sessions.get(&channel_id) {
            let current = existing.handle.state();
            if !current.is_terminal() {
                tracing::debug!(%channel_id, state = %current, "session already running");
                return Ok(current);
            }
        }

        let descriptor = self.directory.resolve(&channel_id)?;
        let (session, handle) = SocketSession::new(descriptor, self.deps.clone());
        let session_id = session.id();
        let registry = Arc::clone(&self.state);
        let owner = channel_id.clone();

        let task = tokio::spawn(async move {
            let termination = session.run().await;
            let mut state = registry.write().await;
            if state
                .sessions
                .get(&owner)
                .is_some_and(|tracked| tracked.handle.id() == session_id)
            {
                let _ = state.sessions.remove(&owner);
            }
            let _ = state.terminations.insert(owner, termination);
        });

        let current = handle.state();
        let _ = state
            .sessions
            .insert(channel_id.clone(), TrackedSession { handle, task });
        tracing::info!(%channel_id, "session started");
        Ok(current)
    }

    /// Stops and forgets the session for `channel_id`.
    ///
    /// Returns `true` if a session was tracked.
    pub async fn disconnect(&self, channel_id: &ChannelId) -> bool {
        let tracked = self.state.write().await.sessions.remove(channel_id);
        let Some(tracked) = tracked else {
            return false;
        };
        stop(&self.state, channel_id, tracked).await;
        tracing::info!(%channel_id, "session disconnected");
        true
    }

    /// Returns the state of the session for `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::SessionNotFound`] if no session is tracked,
    /// including after a session gave up.
    pub async fn status(&self, channel_id: &ChannelId) -> Result<SessionState, RealtimeError> {
        self.state
            .read()
            .await
            .sessions
            .get(channel_id)
            .map(|tracked| tracked.handle.state())
            .ok_or_else(|| RealtimeError::SessionNotFound(channel_id.clone()))
    }

    /// Returns how the most recent finished session for `channel_id` ended.
    pub async fn last_termination(&self, channel_id: &ChannelId) -> Option<Termination> {
        self.state.read().await.terminations.get(channel_id).copied()
    }

    /// Returns every tracked channel with its state, ordered by channel id.
    pub async fn list(&self) -> Vec<(ChannelId, SessionState)> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .sessions
            .iter()
            .map(|(id, tracked)| (id.clone(), tracked.handle.state()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Stops every tracked session. Returns how many were stopped.
    pub async fn shutdown_all(&self) -> usize {
        let drained: Vec<_> = self.state.write().await.sessions.drain().collect();
        let count = drained.len();
        for (_, tracked) in &drained {
            tracked.handle.disconnect();
        }
        for (channel_id, tracked) in drained {
            stop(&self.state, &channel_id, tracked).await;
        }
        tracing::info!(sessions = count, "all sessions stopped");
        count
    }

    /// Returns the number of tracked sessions.
    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Returns `true` if no session is tracked.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.sessions.is_empty()
    }
}

/// Cancels a session and waits for its task. An aborted task never records
/// its own termination, so it is recorded here.
async fn stop(state: &RwLock<RegistryState>, channel_id: &ChannelId, tracked: TrackedSession) {
    let TrackedSession { handle, mut task } = tracked;
    handle.disconnect();
    if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
        tracing::warn!(%channel_id, "session did not stop in time, aborting");
        task.abort();
        let _ = state
            .write()
            .await
            .terminations
            .insert(channel_id.clone(), Termination::Disconnected);
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}
