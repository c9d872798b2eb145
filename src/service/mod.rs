//! Service layer: session lifecycle control.
//!
//! [`SessionRegistry`] owns one supervised task per connected channel and
//! is the control surface the HTTP routes and the UI bridge drive.

pub mod session_registry;

pub use session_registry::SessionRegistry;
