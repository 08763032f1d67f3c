//! Per-field JSON encoding of metadata maps.
//!
//! The backend stores metadata as `key -> JSON string`. Decoding is scoped to a
//! single field: one malformed value yields a fallback for that field only and
//! never discards the surrounding record.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire representation of a metadata map.
pub type MetaFields = BTreeMap<String, String>;

/// Result of decoding one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome<T> {
    Ok(T),
    Malformed {
        key: String,
        error: String,
        fallback: T,
    },
}

impl<T> FieldOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Unwraps the decoded value, logging and substituting the fallback when
    /// the field was malformed.
    pub fn into_value(self, record: &str) -> T {
        match self {
            Self::Ok(value) => value,
            Self::Malformed {
                key,
                error,
                fallback,
            } => {
                tracing::warn!(
                    "Malformed metadata field '{}' in {}, using default: {}",
                    key,
                    record,
                    error
                );
                fallback
            }
        }
    }
}

/// Decodes one field, falling back to `T::default()` on any parse or type error.
pub fn decode_field<T>(key: &str, raw: &str) -> FieldOutcome<T>
where
    T: DeserializeOwned + Default,
{
    match serde_json::from_str::<T>(raw) {
        Ok(value) => FieldOutcome::Ok(value),
        Err(e) => FieldOutcome::Malformed {
            key: key.to_string(),
            error: e.to_string(),
            fallback: T::default(),
        },
    }
}

/// Encodes one field. `None` (and anything that serializes to `null`) is
/// omitted so the wire map never carries a placeholder for an absent value.
pub fn encode_field<T: Serialize>(fields: &mut MetaFields, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(Value::Null) => {}
        Ok(json) => {
            fields.insert(key.to_string(), json.to_string());
        }
        Err(e) => {
            tracing::warn!("Failed to encode metadata field '{}': {}", key, e);
        }
    }
}

/// Serde adapter for string maps written by the web client's `Map` replacer:
/// `{ "dataType": "Map", "value": [[k, v], ...] }`. Plain objects are accepted
/// on read.
pub mod js_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Envelope {
        data_type: String,
        value: Vec<(String, String)>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Incoming {
        Envelope(Envelope),
        Plain(BTreeMap<String, String>),
    }

    pub fn serialize<S>(map: &BTreeMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Envelope {
            data_type: "Map".to_string(),
            value: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Incoming::deserialize(deserializer)? {
            Incoming::Envelope(envelope) => Ok(envelope.value.into_iter().collect()),
            Incoming::Plain(map) => Ok(map),
        }
    }
}
