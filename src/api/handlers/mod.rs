//! REST endpoint handlers organized by resource.

pub mod channels;
pub mod system;
