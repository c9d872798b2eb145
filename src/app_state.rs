//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{Dispatcher, TypingTracker};
use crate::service::SessionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session control surface.
    pub registry: Arc<SessionRegistry>,
    /// Dispatcher the UI bridge subscribes to.
    pub dispatcher: Dispatcher,
    /// Typing indicator state.
    pub typing: Arc<TypingTracker>,
    /// Per-client event buffer of the UI bridge.
    pub bridge_buffer: usize,
}
