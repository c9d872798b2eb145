//! Channel secret lookup.
//!
//! The realtime layer only reads channel secrets; keeping the cached
//! bubble metadata fresh is somebody else's job. [`ChannelDirectory`] is
//! the seam, with an in-memory implementation and one backed by the
//! bubble-overview JSON cache.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use super::{ChannelDescriptor, ChannelId};
use crate::error::RealtimeError;

/// Synchronous, read-only lookup of channel secrets.
pub trait ChannelDirectory: Send + Sync {
    /// Returns the secret for `channel_id`, or `None` if it is unknown.
    fn channel_secret_for(&self, channel_id: &ChannelId) -> Option<String>;

    /// Resolves a full [`ChannelDescriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UnknownChannel`] if no non-empty secret is
    /// known for the channel.
    fn resolve(&self, channel_id: &ChannelId) -> Result<ChannelDescriptor, RealtimeError> {
        match self.channel_secret_for(channel_id) {
            Some(secret) if !secret.is_empty() => {
                Ok(ChannelDescriptor::new(channel_id.clone(), secret))
            }
            _ => Err(RealtimeError::UnknownChannel(channel_id.clone())),
        }
    }
}

/// In-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticChannelDirectory {
    secrets: HashMap<ChannelId, String>,
}

impl StaticChannelDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a channel secret.
    #[must_use]
    pub fn with(mut self, channel_id: impl Into<ChannelId>, secret: impl Into<String>) -> Self {
        let _ = self.secrets.insert(channel_id.into(), secret.into());
        self
    }
}

impl ChannelDirectory for StaticChannelDirectory {
    fn channel_secret_for(&self, channel_id: &ChannelId) -> Option<String> {
        self.secrets.get(channel_id).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct BubbleOverview {
    #[serde(default)]
    bubbles: Vec<BubbleRecord>,
}

#[derive(Debug, Deserialize)]
struct BubbleRecord {
    id: ChannelId,
    #[serde(default)]
    channelcode: Option<String>,
}

/// Directory loaded from the cached bubble-overview document.
///
/// The document has the shape
/// `{"bubbles": [{"id": 4209040, "channelcode": "...", ...}], "stats": [...]}`;
/// only `id` and `channelcode` are read. Bubbles without a channel code
/// are skipped.
pub struct BubbleCacheDirectory {
    secrets: HashMap<ChannelId, String>,
}

impl BubbleCacheDirectory {
    /// Parses a bubble-overview document.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if the document is not valid JSON
    /// of the expected shape.
    pub fn from_json(json: &str) -> Result<Self, RealtimeError> {
        let overview: BubbleOverview = serde_json::from_str(json)
            .map_err(|e| RealtimeError::Config(format!("invalid bubble cache: {e}")))?;
        let secrets = overview
            .bubbles
            .into_iter()
            .filter_map(|b| b.channelcode.map(|code| (b.id, code)))
            .collect();
        Ok(Self { secrets })
    }

    /// Reads and parses the cache file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RealtimeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RealtimeError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let directory = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), channels = directory.len(), "bubble cache loaded");
        Ok(directory)
    }

    /// Returns the number of channels with a known secret.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Returns `true` if no channel has a known secret.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl ChannelDirectory for BubbleCacheDirectory {
    fn channel_secret_for(&self, channel_id: &ChannelId) -> Option<String> {
        self.secrets.get(channel_id).cloned()
    }
}

impl fmt::Debug for BubbleCacheDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BubbleCacheDirectory")
            .field("channels", &self.secrets.len())
            .finish()
    }
}
