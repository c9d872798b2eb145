//! Realtime error types with retry classification and HTTP status mapping.
//!
//! [`RealtimeError`] is the central error type. The leaf errors
//! ([`TransportError`], [`AuthError`], [`DecodeError`]) describe failures
//! scoped to one frame or one connection; only
//! [`RealtimeError::UnknownChannel`] ever reaches a `connect` caller
//! synchronously.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ChannelId;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "unknown channel: 42"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Connect, read, or write failure on the relay transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the socket to the relay failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The relay closed the connection.
    #[error("connection closed by relay")]
    Closed,

    /// The connection-established frame did not arrive in time.
    #[error("no connection-established frame within {0} s")]
    HandshakeTimeout(u64),
}

/// Failure of the subscription-token exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request could not be sent or timed out.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The backend answered with a non-2xx status.
    #[error("auth rejected with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("malformed auth response: {0}")]
    Body(String),

    /// The relay refused the signed subscription.
    #[error("subscription rejected by relay: {0}")]
    Rejected(String),
}

/// A single frame that could not be decoded. Never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("frame is not JSON: {0}")]
    NotJson(String),

    /// The frame is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame carries no string `event` field.
    #[error("frame has no event name")]
    MissingEvent,

    /// The handshake frame did not carry a usable socket id.
    #[error("bad handshake frame: {0}")]
    Handshake(String),
}

/// Crate-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status          |
/// |-----------|-------------------|----------------------|
/// | 1000–1999 | Configuration     | 500                  |
/// | 2000–2999 | Lookup/Not Found  | 404 Not Found        |
/// | 3000–3999 | Connection-local  | 502 Bad Gateway      |
/// | 4000–4999 | Frame-local       | 422                  |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// No channel secret could be resolved for the channel.
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// No session is tracked for the channel.
    #[error("no session for channel {0}")]
    SessionNotFound(ChannelId),

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Auth failure.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Frame decode failure.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Reconnect attempts exhausted.
    #[error("gave up on channel {channel_id} after {attempts} attempts")]
    GaveUp {
        /// Channel that terminated.
        channel_id: ChannelId,
        /// Failed attempts since the last successful subscription.
        attempts: u32,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::UnknownChannel(_) => 2001,
            Self::SessionNotFound(_) => 2002,
            Self::Transport(_) => 3001,
            Self::Auth(_) => 3002,
            Self::GaveUp { .. } => 3003,
            Self::Decode(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownChannel(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Transport(_) | Self::Auth(_) | Self::GaveUp { .. } => StatusCode::BAD_GATEWAY,
            Self::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if the owning session should retry per its
    /// reconnect policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Auth(_))
    }
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
