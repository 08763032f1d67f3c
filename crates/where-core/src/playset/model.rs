//! Catalog entities: spaces, templates, svg markers, emoji groups and playsets.

use crate::ids::{EntryId, SpaceId};
use crate::meta_field::{MetaFields, js_map};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A backend record together with its content address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hashed<K, T> {
    pub hash: K,
    pub content: T,
}

/// How markers are drawn on a Space.
///
/// Encoded as its ordinal, which is what the web client stores in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MarkerType {
    AnyEmoji,
    #[default]
    Avatar,
    Initials,
    SingleEmoji,
    SvgMarker,
    EmojiGroup,
    Tag,
}

impl MarkerType {
    pub const ALL: [MarkerType; 7] = [
        MarkerType::AnyEmoji,
        MarkerType::Avatar,
        MarkerType::Initials,
        MarkerType::SingleEmoji,
        MarkerType::SvgMarker,
        MarkerType::EmojiGroup,
        MarkerType::Tag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarkerType::AnyEmoji => "AnyEmoji",
            MarkerType::Avatar => "Avatar",
            MarkerType::Initials => "Initials",
            MarkerType::SingleEmoji => "SingleEmoji",
            MarkerType::SvgMarker => "SvgMarker",
            MarkerType::EmojiGroup => "EmojiGroup",
            MarkerType::Tag => "Tag",
        }
    }
}

impl TryFrom<u8> for MarkerType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("unknown marker type ordinal {}", value))
    }
}

impl From<MarkerType> for u8 {
    fn from(value: MarkerType) -> Self {
        value as u8
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Marker artwork attached to a Space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPiece {
    Svg(EntryId),
    EmojiGroup(EntryId),
}

/// Kinds of catalog pieces that can be exported between instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    SvgMarker,
    EmojiGroup,
    Template,
    Space,
}

impl PieceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PieceKind::SvgMarker => "SvgMarker",
            PieceKind::EmojiGroup => "EmojiGroup",
            PieceKind::Template => "Template",
            PieceKind::Space => "Space",
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Wire entries
// ============================================================================

/// Space entry as stored by the backend. `surface` and each `meta` value are
/// JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub name: String,
    pub origin: EntryId,
    pub surface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maybe_marker_piece: Option<MarkerPiece>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaFields>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub surface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvgMarker {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiGroup {
    pub name: String,
    pub description: String,
    pub unicodes: Vec<String>,
}

/// A curated bundle of pieces published in the global catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playset {
    pub name: String,
    pub description: String,
    pub templates: Vec<EntryId>,
    pub svg_markers: Vec<EntryId>,
    pub emoji_groups: Vec<EntryId>,
    pub spaces: Vec<EntryId>,
}

/// Ids of every piece an instance holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub templates: Vec<EntryId>,
    pub svg_markers: Vec<EntryId>,
    pub emoji_groups: Vec<EntryId>,
    pub spaces: Vec<EntryId>,
}

/// Total number of pieces in an inventory.
pub fn count_inventory(inventory: &Inventory) -> usize {
    inventory.templates.len()
        + inventory.spaces.len()
        + inventory.svg_markers.len()
        + inventory.emoji_groups.len()
}

// ============================================================================
// Materialized types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UiBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiItem {
    #[serde(rename = "box")]
    pub ui_box: UiBox,
    pub style: String,
    pub content: String,
}

/// Typed view of a Space's metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpaceMeta {
    pub ui: Vec<UiItem>,
    #[serde(with = "js_map")]
    pub sub_map: BTreeMap<String, String>,
    pub marker_type: MarkerType,
    pub single_emoji: String,
    pub multi: bool,
    pub can_tag: bool,
    pub tag_visible: bool,
    pub tag_as_marker: bool,
    pub predefined_tags: Vec<String>,
    pub session_count: u32,
    pub can_modify_past: bool,
    pub session_labels: Vec<String>,
}

impl Default for SpaceMeta {
    fn default() -> Self {
        Self {
            ui: Vec::new(),
            sub_map: BTreeMap::new(),
            marker_type: MarkerType::Avatar,
            single_emoji: "😀".to_string(),
            multi: false,
            can_tag: false,
            tag_visible: false,
            tag_as_marker: false,
            predefined_tags: Vec::new(),
            session_count: 2,
            can_modify_past: true,
            session_labels: Vec::new(),
        }
    }
}

/// A Space with its surface and metadata decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceMat {
    pub name: String,
    pub origin: EntryId,
    pub surface: serde_json::Value,
    pub maybe_marker_piece: Option<MarkerPiece>,
    pub meta: SpaceMeta,
}

/// Cache root of the Playset namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaysetPerspective {
    pub svg_markers: HashMap<EntryId, SvgMarker>,
    pub emoji_groups: HashMap<EntryId, EmojiGroup>,
    pub templates: HashMap<EntryId, Template>,
    pub spaces: HashMap<SpaceId, SpaceMat>,
}

/// Cache root of the Ludotheque namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LudothequePerspective {
    pub playsets: HashMap<EntryId, Playset>,
}
