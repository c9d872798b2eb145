//! Relay frame decoding.
//!
//! The relay wraps every event as `{"event": .., "channel": .., "data": ..}`
//! where `data` is usually itself a JSON document encoded as a string.
//! [`decode`] unwraps that one extra level and maps the namespaced event
//! name onto an [`EventKind`]. Event names without a mapping decode to
//! [`EventKind::Unrecognized`] so new server event types pass through.
//!
//! Everything here is pure: no I/O and no shared state.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::messages::{
    CONNECTION_ESTABLISHED, ConnectionEstablished, OutboundFrame, PING_LITERAL, PONG_LITERAL,
    PROTOCOL_PING, PROTOCOL_PONG, SUBSCRIPTION_ERROR,
};
use crate::domain::{ChannelId, EventKind, NormalizedEvent};
use crate::error::DecodeError;

/// Version of the event-name mapping in [`event_kind_for`]. Bump when a
/// name moves between variants.
pub const EVENT_MAPPING_VERSION: u32 = 1;

/// Prefix the relay puts on client-originated events.
const CLIENT_EVENT_PREFIX: &str = "client-";

/// Which keepalive form the relay used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keepalive {
    /// Literal `ping` text frame.
    Literal,
    /// `{"event":"pusher:ping"}` frame.
    Protocol,
}

impl Keepalive {
    /// Returns the frame that answers this keepalive.
    #[must_use]
    pub fn reply(self) -> String {
        match self {
            Self::Literal => PONG_LITERAL.to_string(),
            Self::Protocol => OutboundFrame::Pong.to_text(),
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Keepalive probe; answer it and do not dispatch.
    Ping(Keepalive),
    /// Reply to our own keepalive; nothing to do.
    Pong,
    /// The relay refused the subscription; carries its reason.
    SubscriptionError(String),
    /// Application or subscription event.
    Event(NormalizedEvent),
}

/// Decodes a raw text frame received now.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the frame is not a JSON object with a
/// string `event` field. The caller drops the frame and keeps going.
pub fn decode(raw: &str, channel_id: &ChannelId) -> Result<Inbound, DecodeError> {
    decode_at(raw, channel_id, Utc::now())
}

/// Decodes a raw text frame with an explicit receive timestamp.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_at(
    raw: &str,
    channel_id: &ChannelId,
    received_at: DateTime<Utc>,
) -> Result<Inbound, DecodeError> {
    if raw == PING_LITERAL {
        return Ok(Inbound::Ping(Keepalive::Literal));
    }

    let Value::Object(mut frame) =
        serde_json::from_str::<Value>(raw).map_err(|e| DecodeError::NotJson(e.to_string()))?
    else {
        return Err(DecodeError::NotAnObject);
    };

    let name = match frame.remove("event") {
        Some(Value::String(name)) => name,
        _ => return Err(DecodeError::MissingEvent),
    };
    match name.as_str() {
        PROTOCOL_PING => return Ok(Inbound::Ping(Keepalive::Protocol)),
        PROTOCOL_PONG => return Ok(Inbound::Pong),
        SUBSCRIPTION_ERROR => {
            return Ok(Inbound::SubscriptionError(rejection_reason(frame.remove("data"))));
        }
        _ => {}
    }

    let short = normalize_event_name(&name);
    let topic = match frame.remove("channel") {
        Some(Value::String(topic)) => Some(topic),
        _ => None,
    };

    let (kind, payload) = match unwrap_data(frame.remove("data")) {
        Ok(payload) => (event_kind_for(short), payload),
        Err(raw_data) => {
            let mut payload = Map::new();
            let _ = payload.insert("data".to_string(), Value::String(raw_data));
            (EventKind::Unrecognized(short.to_string()), payload)
        }
    };

    Ok(Inbound::Event(NormalizedEvent {
        kind,
        channel_id: channel_id.clone(),
        topic,
        payload,
        received_at,
    }))
}

/// Describes a subscription error from its `data`, e.g.
/// `{"type":"AuthError","error":"invalid signature","status":401}`.
fn rejection_reason(data: Option<Value>) -> String {
    let payload = match unwrap_data(data) {
        Ok(payload) => payload,
        Err(raw) => return raw,
    };
    let error = payload.get("error").and_then(Value::as_str);
    match (error, payload.get("status").and_then(Value::as_u64)) {
        (Some(error), Some(status)) => format!("{error} (status {status})"),
        (Some(error), None) => error.to_string(),
        (None, _) if payload.is_empty() => "no reason given".to_string(),
        (None, _) => Value::Object(payload).to_string(),
    }
}

/// Turns the `data` field into a payload map.
///
/// Returns the original string when it is a string that does not parse
/// as JSON.
fn unwrap_data(data: Option<Value>) -> Result<Map<String, Value>, String> {
    let value = match data {
        None | Some(Value::Null) => return Ok(Map::new()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(inner) => inner,
            Err(_) => return Err(text),
        },
        Some(other) => other,
    };
    Ok(match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            let _ = map.insert("data".to_string(), other);
            map
        }
    })
}

/// Strips the client prefix and any backslash namespace from an event
/// name: `client-App\Events\UserTyping` becomes `UserTyping`.
#[must_use]
pub fn normalize_event_name(name: &str) -> &str {
    let name = name.strip_prefix(CLIENT_EVENT_PREFIX).unwrap_or(name);
    let name = name.rsplit('\\').next().unwrap_or(name);
    name.strip_prefix('.').unwrap_or(name)
}

/// Maps a normalized event name onto its kind.
#[must_use]
pub fn event_kind_for(name: &str) -> EventKind {
    match name {
        "MessageAdded" => EventKind::MessageAdded,
        "MessageUpdated" => EventKind::MessageUpdated,
        "MessageRemoved" => EventKind::MessageRemoved,
        "MarkUpdated" => EventKind::MarkUpdated,
        "UserTyping" => EventKind::UserTyping,
        "UserStoppedTyping" => EventKind::UserStoppedTyping,
        "pusher:subscription_succeeded" | "pusher_internal:subscription_succeeded" => {
            EventKind::SubscriptionSucceeded
        }
        other => EventKind::Unrecognized(other.to_string()),
    }
}

/// Extracts the socket id from the connection-established frame.
///
/// A literal `ping` is not a handshake frame; callers answer it and wait
/// for the next one.
///
/// # Errors
///
/// Returns [`DecodeError::Handshake`] if the frame is not a
/// connection-established event or its nested `data` has no socket id.
pub fn parse_connection_established(raw: &str) -> Result<ConnectionEstablished, DecodeError> {
    let frame: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let name = frame
        .get("event")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingEvent)?;
    if name != CONNECTION_ESTABLISHED {
        return Err(DecodeError::Handshake(format!("expected {CONNECTION_ESTABLISHED}, got {name}")));
    }
    let parsed = match frame.get("data") {
        Some(Value::String(text)) => serde_json::from_str::<ConnectionEstablished>(text),
        Some(obj @ Value::Object(_)) => serde_json::from_value::<ConnectionEstablished>(obj.clone()),
        _ => return Err(DecodeError::Handshake("missing data".to_string())),
    };
    let established = parsed.map_err(|e| DecodeError::Handshake(e.to_string()))?;
    if established.socket_id.is_empty() {
        return Err(DecodeError::Handshake("empty socket_id".to_string()));
    }
    Ok(established)
}

/// Returns the keepalive frame a session sends after an idle period.
#[must_use]
pub fn keepalive_ping() -> String {
    OutboundFrame::Ping.to_text()
}
