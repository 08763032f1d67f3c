//! Wire records of the Where zome.

use crate::ids::{AgentId, LinkId, SessionId, SpaceId};
use crate::meta_field::MetaFields;
use serde::{Deserialize, Serialize};

/// A placement as stored by the backend: `value` is the JSON-encoded
/// coordinate and every `meta` value is itself a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HereEntry {
    pub value: String,
    #[serde(rename = "sessionEh")]
    pub session_id: SessionId,
    pub meta: MetaFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HereOutput {
    pub entry: HereEntry,
    #[serde(rename = "linkAh")]
    pub link_id: LinkId,
    pub author: AgentId,
}

/// Session entry as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSessionEntry {
    pub name: String,
    pub index: u32,
    #[serde(rename = "spaceEh")]
    pub space_id: SpaceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddHereInput {
    #[serde(rename = "spaceEh")]
    pub space_id: SpaceId,
    pub session_index: u32,
    pub value: String,
    pub meta: MetaFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceSessionsInput {
    #[serde(rename = "spaceEh")]
    pub space_id: SpaceId,
    pub session_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNextSessionInput {
    #[serde(rename = "spaceEh")]
    pub space_id: SpaceId,
    pub name: String,
}
