//! Data Transfer Objects for REST responses.

pub mod channel_dto;

pub use channel_dto::*;
