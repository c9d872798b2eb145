//! Bridge message types: client commands and server messages.

use serde::{Deserialize, Serialize};

use crate::domain::{ChannelId, NormalizedEvent, SessionState, Termination};

/// A command sent by a bridge client.
///
/// ```json
/// {"id": "req-1", "command": "connect", "channel_id": 42}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    /// Client-chosen id echoed in the reply.
    #[serde(default)]
    pub id: Option<String>,
    /// The command itself.
    #[serde(flatten)]
    pub command: BridgeCommand,
}

/// Commands a bridge client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Widen the event scope. `"*"` selects every channel.
    Subscribe {
        /// Channels to add.
        channel_ids: Vec<ChannelId>,
    },
    /// Narrow the event scope.
    Unsubscribe {
        /// Channels to remove.
        channel_ids: Vec<ChannelId>,
    },
    /// Start a relay session.
    Connect {
        /// Channel to connect.
        channel_id: ChannelId,
    },
    /// Stop a relay session.
    Disconnect {
        /// Channel to disconnect.
        channel_id: ChannelId,
    },
    /// Report a session's state.
    Status {
        /// Channel to look up.
        channel_id: ChannelId,
    },
}

/// Result payload of a successful command.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    /// Current scope after subscribe or unsubscribe.
    Scope {
        /// Explicitly subscribed channels.
        channels: Vec<ChannelId>,
        /// Whether the wildcard is active.
        all: bool,
    },
    /// Session state after connect or status.
    Session {
        /// Channel the answer is about.
        channel_id: ChannelId,
        /// Current state, absent when no session is tracked.
        state: Option<SessionState>,
        /// How the last session ended, if one did.
        last_termination: Option<Termination>,
    },
    /// Outcome of disconnect.
    Disconnected {
        /// Channel the answer is about.
        channel_id: ChannelId,
        /// Whether a session existed.
        existed: bool,
    },
}

/// Messages sent by the bridge to its clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// A realtime event.
    Event(NormalizedEvent),
    /// Reply to a command.
    Response {
        /// Echo of the request id.
        id: Option<String>,
        /// Command result.
        result: CommandResult,
    },
    /// A command failed.
    Error {
        /// Echo of the request id, when the request parsed.
        id: Option<String>,
        /// Numeric error code.
        code: u32,
        /// Human-readable message.
        message: String,
    },
}

impl BridgeMessage {
    /// Serializes the message to a JSON text frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
