use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::EntityId;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Host,
    Ip,
    Domain,
    FileHash,
    User,
    Url,
    Process,
}

impl EntityType {
    fn tag(self) -> &'static str {
        match self {
            EntityType::Host => "host",
            EntityType::Ip => "ip",
            EntityType::Domain => "domain",
            EntityType::FileHash => "file_hash",
            EntityType::User => "user",
            EntityType::Url => "url",
            EntityType::Process => "process",
        }
    }
}

/// Canonical representation of a real-world object. `id` is a pure function
/// of `(type, value)` after normalization — see `derive_id`. Callers must
/// normalize `value` themselves (the `normalize` module owns the per-type
/// rules); this type only computes the id, it does not normalize.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub value: String,
    pub id: EntityId,
}

impl Entity {
    /// `sha256(type || ":" || value)` truncated to the first 128 bits.
    /// `value` must already be normalized; this function does not re-derive
    /// normalization, it only hashes.
    pub fn derive_id(kind: EntityType, normalized_value: &str) -> EntityId {
        let mut hasher = Sha256::new();
        hasher.update(kind.tag().as_bytes());
        hasher.update(b":");
        hasher.update(normalized_value.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        EntityId(bytes)
    }

    pub fn new(kind: EntityType, normalized_value: String) -> Self {
        let id = Self::derive_id(kind, &normalized_value);
        Entity {
            kind,
            value: normalized_value,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_a_pure_function_of_type_and_value() {
        let a = Entity::new(EntityType::Host, "h1".to_string());
        let b = Entity::new(EntityType::Host, "h1".to_string());
        assert_eq!(a.id, b.id);

        let c = Entity::new(EntityType::Ip, "h1".to_string());
        assert_ne!(a.id, c.id);
    }
}
