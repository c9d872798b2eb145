//! Lifecycle states of a socket session.

use std::fmt;

use serde::Serialize;

/// State of one [`crate::relay::SocketSession`].
///
/// Only the session's own control loop moves between these; callers
/// observe them through [`crate::service::SessionRegistry::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started.
    Disconnected,
    /// Opening the transport to the relay.
    Connecting,
    /// Transport open, waiting for the connection-established frame.
    AwaitingTransportId,
    /// Exchanging the socket id for a subscription token.
    Authenticating,
    /// Subscribe frame sent, receive loop running.
    Subscribed,
    /// Waiting out a backoff before the next connect.
    Reconnecting,
    /// Stopped for good.
    Terminated,
}

impl SessionState {
    /// Returns `true` for [`SessionState::Terminated`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Returns the state as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingTransportId => "awaiting_transport_id",
            Self::Authenticating => "authenticating",
            Self::Subscribed => "subscribed",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a channel's session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The caller disconnected it.
    Disconnected,
    /// The reconnect policy was exhausted.
    GaveUp {
        /// Consecutive failed attempts.
        attempts: u32,
    },
}
