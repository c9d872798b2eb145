//! # bubble-realtime
//!
//! Multiplexed realtime session manager for chat bubble channels carried
//! over a Pusher-protocol relay.
//!
//! Each connected bubble gets one supervised relay session that performs
//! the relay handshake, obtains a signed subscription token from the chat
//! backend, subscribes to the bubble's private topic, and then normalizes
//! every inbound frame into a [`domain::NormalizedEvent`] handed to the
//! [`domain::Dispatcher`]. Dropped connections are retried with capped
//! exponential backoff until the attempt budget runs out.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP control, WebSocket UI bridge)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── UI Bridge (ws/)
//!     │
//!     ├── SessionRegistry (service/)
//!     │
//!     ├── SocketSession ── AuthBroker ── chat backend
//!     │      │
//!     │      └── RelayTransport ── relay
//!     │
//!     └── Dispatcher ── consumers (logging, typing, bridge)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod relay;
pub mod service;
pub mod ws;
