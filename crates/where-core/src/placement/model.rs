//! Placement domain models: locations, sessions, manifests and plays.

use crate::ids::{AgentId, LinkId, SessionId, SpaceId};
use crate::playset::{MarkerType, SpaceMat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A point on a Space's surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Free-form metadata of a placement.
///
/// Known keys are typed; anything else the web client wrote is kept in
/// `extra` so it survives a round trip. Absent values are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMeta {
    pub marker_type: Option<MarkerType>,
    pub tag: Option<String>,
    pub img: Option<Value>,
    pub color: Option<String>,
    pub author_name: Option<String>,
    pub emoji: Option<String>,
    pub svg_marker: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub coord: Coord,
    pub session_id: SessionId,
    pub meta: LocationMeta,
}

/// A Location together with the identity of the record that placed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub location: Location,
    pub link_id: LinkId,
    pub author: AgentId,
}

/// An ordered partition of Locations within a Space.
///
/// Deleted Locations leave a `None` tombstone so positions never shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSession {
    pub name: String,
    pub index: u32,
    pub locations: Vec<Option<LocationInfo>>,
}

impl PlacementSession {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            locations: Vec::new(),
        }
    }

    /// Position of the live Location placed by `link_id`.
    pub fn position_of(&self, link_id: &LinkId) -> Option<usize> {
        self.locations
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|info| &info.link_id == link_id))
    }

    pub fn contains_link(&self, link_id: &LinkId) -> bool {
        self.position_of(link_id).is_some()
    }

    /// Live Locations with their positions.
    pub fn live_locations(&self) -> impl Iterator<Item = (usize, &LocationInfo)> {
        self.locations
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|info| (idx, info)))
    }
}

/// Client-local bookkeeping of a Space's known sessions and visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayManifest {
    pub space_id: SpaceId,
    pub visible: bool,
    pub session_ids: Vec<SessionId>,
}

impl PlayManifest {
    pub fn new(space_id: SpaceId) -> Self {
        Self {
            space_id,
            visible: true,
            session_ids: Vec::new(),
        }
    }
}

/// Cache root of the Where namespace.
///
/// A session id listed by a manifest but absent from `sessions` is still
/// loading; it is not an empty session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WherePerspective {
    pub manifests: HashMap<SpaceId, PlayManifest>,
    pub sessions: HashMap<SessionId, PlacementSession>,
}

impl WherePerspective {
    /// Session ids referenced by the manifest that are not loaded yet.
    pub fn loading_sessions(&self, space_id: &SpaceId) -> Vec<SessionId> {
        self.manifests
            .get(space_id)
            .map(|manifest| {
                manifest
                    .session_ids
                    .iter()
                    .filter(|id| !self.sessions.contains_key(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A live Space with its sessions, keyed by session name.
#[derive(Debug, Clone, PartialEq)]
pub struct Play {
    pub space: SpaceMat,
    pub sessions: BTreeMap<String, SessionId>,
}
