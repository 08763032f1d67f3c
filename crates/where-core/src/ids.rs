//! Opaque identifiers handed out by the backend.
//!
//! Every id is the base64 rendering of a content address or action hash. The
//! client never inspects them; it only compares, hashes and forwards them.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

hash_id!(
    /// Content address of a published Space.
    SpaceId
);
hash_id!(
    /// Content address of a placement session.
    SessionId
);
hash_id!(
    /// Identity of one placement record. Changes on every update.
    LinkId
);
hash_id!(
    /// Public key of an agent.
    AgentId
);
hash_id!(
    /// Content address of a catalog piece (template, svg marker, emoji group, playset).
    EntryId
);
hash_id!(
    /// Hash of a backend instance's code.
    DnaId
);

impl From<SpaceId> for EntryId {
    fn from(value: SpaceId) -> Self {
        Self(value.0)
    }
}

impl From<EntryId> for SpaceId {
    fn from(value: EntryId) -> Self {
        Self(value.0)
    }
}

/// Address of one backend instance: a dna run by one agent.
///
/// Serialized as a two-element array, matching the conductor's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub DnaId, pub AgentId);

impl CellId {
    pub fn new(dna: impl Into<DnaId>, agent: impl Into<AgentId>) -> Self {
        Self(dna.into(), agent.into())
    }

    pub fn dna(&self) -> &DnaId {
        &self.0
    }

    pub fn agent(&self) -> &AgentId {
        &self.1
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = SpaceId::new("uhCEkSpace");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"uhCEkSpace\"");
    }

    #[test]
    fn test_cell_id_wire_shape() {
        let cell = CellId::new("uhC0kDna", "uhCAkAlice");
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json, serde_json::json!(["uhC0kDna", "uhCAkAlice"]));
        assert_eq!(cell.agent().as_str(), "uhCAkAlice");
    }
}
