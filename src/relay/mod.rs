//! Relay client.
//!
//! Everything that talks to the push relay lives here: the wire
//! [`messages`], the inbound [`codec`], the [`auth`] token exchange, the
//! [`transport`] seam, the [`backoff`] policy, and the per-channel
//! [`session`] state machine that ties them together.

pub mod auth;
pub mod backoff;
pub mod codec;
pub mod messages;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthBroker, HttpAuthBroker};
pub use backoff::{ReconnectAttemptState, ReconnectPolicy};
pub use session::{SessionDeps, SessionHandle, SessionId, SessionSettings, SocketSession};
pub use transport::{RelayConnector, RelayTransport, TungsteniteConnector};
