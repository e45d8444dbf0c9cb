//! Identity types for registered entities.
//!
//! [`EntityKey`] identifies an entity inside one repository of the registry.
//! Loaded entities are keyed by their persisted id; entities created during
//! the current batch get a pending slot until the store assigns an id.
//! [`EntityUuid`] is the client-generated identifier used to link new
//! children to new parents within one batch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of identifier backs an [`EntityKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeySlot {
    /// Row id assigned by the store.
    Persisted(i64),
    /// Per-batch counter for entities not yet written.
    Pending(u32),
}

/// Stable registry key: the type's short name plus a [`KeySlot`].
///
/// Renders as `wave_12` for persisted entities and `wave_new3` for pending
/// ones, so the two kinds can never collide within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    short_name: String,
    slot: KeySlot,
}

impl EntityKey {
    /// Key for an entity loaded from the store.
    pub fn persisted(short_name: impl Into<String>, id: i64) -> Self {
        EntityKey {
            short_name: short_name.into(),
            slot: KeySlot::Persisted(id),
        }
    }

    /// Key for an entity created in the current batch.
    pub fn pending(short_name: impl Into<String>, counter: u32) -> Self {
        EntityKey {
            short_name: short_name.into(),
            slot: KeySlot::Pending(counter),
        }
    }

    /// The entity type's short name (e.g. `wave`).
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn slot(&self) -> KeySlot {
        self.slot
    }

    /// The persisted id, if this key was built from one.
    pub fn persisted_id(&self) -> Option<i64> {
        match self.slot {
            KeySlot::Persisted(id) => Some(id),
            KeySlot::Pending(_) => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            KeySlot::Persisted(id) => write!(f, "{}_{}", self.short_name, id),
            KeySlot::Pending(n) => write!(f, "{}_new{}", self.short_name, n),
        }
    }
}

/// Client-generated identifier of a not-yet-persisted entity.
///
/// Any string is accepted; [`EntityUuid::new_v4`] is a convenience for
/// callers that do not already have their own scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityUuid(pub String);

impl EntityUuid {
    /// Generates a random v4 UUID.
    pub fn new_v4() -> Self {
        EntityUuid(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityUuid {
    fn from(s: &str) -> Self {
        EntityUuid(s.to_string())
    }
}

impl From<String> for EntityUuid {
    fn from(s: String) -> Self {
        EntityUuid(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_and_pending_keys_render_differently() {
        let loaded = EntityKey::persisted("wave", 3);
        let pending = EntityKey::pending("wave", 3);
        assert_eq!(loaded.to_string(), "wave_3");
        assert_eq!(pending.to_string(), "wave_new3");
        assert_ne!(loaded, pending);
    }

    #[test]
    fn test_persisted_id_only_for_persisted_slot() {
        assert_eq!(EntityKey::persisted("circuit", 9).persisted_id(), Some(9));
        assert_eq!(EntityKey::pending("circuit", 1).persisted_id(), None);
    }

    #[test]
    fn test_entity_uuid_is_transparent_in_json() {
        let uuid = EntityUuid::from("abc-123");
        assert_eq!(serde_json::to_string(&uuid).unwrap(), "\"abc-123\"");
        let generated = EntityUuid::new_v4();
        assert_eq!(generated.as_str().len(), 36);
        assert_ne!(generated, EntityUuid::new_v4());
    }
}
