//! Type-safe chat bubble identifier.
//!
//! [`ChannelId`] wraps the opaque bubble id handed out by the chat backend.
//! The backend uses numeric ids on the wire but the realtime layer treats
//! them as opaque strings, so `4209040` and `"4209040"` name the same
//! channel.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of one chat bubble (one realtime channel).
///
/// Used as the key in [`crate::service::SessionRegistry`], as the tag on
/// every [`super::NormalizedEvent`], and as the scope of an
/// [`super::EventFilter::Channel`] subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Creates a `ChannelId` from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ChannelId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::from(n),
            Raw::Text(s) => Self(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_are_equal() {
        assert_eq!(ChannelId::from(4_209_040_u64), ChannelId::from("4209040"));
    }

    #[test]
    fn deserializes_from_number_or_string() {
        let Ok(from_num) = serde_json::from_str::<ChannelId>("42") else {
            panic!("number should deserialize");
        };
        let Ok(from_str) = serde_json::from_str::<ChannelId>("\"42\"") else {
            panic!("string should deserialize");
        };
        assert_eq!(from_num, from_str);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&ChannelId::from(7_u64)).unwrap_or_default();
        assert_eq!(json, "\"7\"");
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let id = ChannelId::from("1");
        let mut map = HashMap::new();
        map.insert(id.clone(), "test");
        assert_eq!(map.get(&id), Some(&"test"));
    }
}
