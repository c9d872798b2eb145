//! UI bridge: a local WebSocket endpoint over the dispatcher.
//!
//! `GET /ws` streams realtime events to browser clients as JSON. A client
//! may scope the stream with `?channel=<id>` and send commands to widen
//! or narrow the scope, or to connect and disconnect relay sessions.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod scope;
