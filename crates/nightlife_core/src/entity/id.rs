//! Entity identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

const TEMPORARY_PREFIX: &str = "tmp-";

/// Identifier of an entity.
///
/// Ids are assigned by the backend and are opaque strings. Before the
/// backend acknowledges a create, the entity carries a temporary id minted
/// locally with [`EntityId::temporary`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an id from a backend-assigned value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh local id for an entity the backend has not seen yet.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4()))
    }

    /// Returns true if this id was minted locally and not yet swapped.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for EntityId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Some backends hand out numeric ids; normalize them to strings.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        let id = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Unsigned(n) => n.to_string(),
            Raw::Signed(n) => n.to_string(),
        };
        if id.is_empty() {
            return Err(serde::de::Error::custom("entity id must not be empty"));
        }
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_ids_are_unique_and_flagged() {
        let a = EntityId::temporary();
        let b = EntityId::temporary();
        assert_ne!(a, b);
        assert!(a.is_temporary());
        assert!(!EntityId::new("e1").is_temporary());
    }

    #[test]
    fn numeric_ids_are_normalized() {
        let id: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");

        let id: EntityId = serde_json::from_str("\"club-7\"").unwrap();
        assert_eq!(id, EntityId::from("club-7"));
    }

    #[test]
    fn empty_id_rejected() {
        assert!(serde_json::from_str::<EntityId>("\"\"").is_err());
    }
}
