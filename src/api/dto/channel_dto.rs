//! Channel control and status DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ChannelId, SessionState, Termination};

/// One tracked channel in a list response.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummaryDto {
    /// Channel (bubble) id.
    pub channel_id: ChannelId,
    /// Current session state.
    pub state: SessionState,
}

/// Response for `GET /channels`.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelListResponse {
    /// Tracked channels ordered by id.
    pub channels: Vec<ChannelSummaryDto>,
    /// Number of tracked channels.
    pub total: usize,
}

/// A user currently typing in a channel.
#[derive(Debug, Clone, Serialize)]
pub struct TypingUserDto {
    /// User id as sent by the backend.
    pub user_id: String,
    /// When the user started typing.
    pub since: DateTime<Utc>,
}

/// Response for `GET /channels/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatusResponse {
    /// Channel (bubble) id.
    pub channel_id: ChannelId,
    /// Current session state, absent once the session is gone.
    pub state: Option<SessionState>,
    /// How the channel's most recent session ended.
    pub last_termination: Option<Termination>,
    /// Users currently typing.
    pub typing: Vec<TypingUserDto>,
}

/// Response for `POST /channels/{id}/connect`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectResponse {
    /// Channel (bubble) id.
    pub channel_id: ChannelId,
    /// Session state right after the call.
    pub state: SessionState,
}
