use super::port::ZomeGateway;
use super::proxy::ZomeProxy;
use crate::error::Result;
use crate::ids::{CellId, EntryId, SpaceId};
use crate::playset::{
    EmojiGroup, Hashed, Inventory, PieceKind, Playset, Space, SvgMarker, Template,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Function names exported by the Playset zome.
pub mod playset_fn {
    pub const CREATE_TEMPLATE: &str = "create_template";
    pub const GET_TEMPLATE: &str = "get_template";
    pub const GET_TEMPLATES: &str = "get_templates";
    pub const CREATE_SVG_MARKER: &str = "create_svg_marker";
    pub const GET_SVG_MARKER: &str = "get_svg_marker";
    pub const GET_SVG_MARKERS: &str = "get_svg_markers";
    pub const CREATE_EMOJI_GROUP: &str = "create_emoji_group";
    pub const GET_EMOJI_GROUP: &str = "get_emoji_group";
    pub const GET_ALL_EMOJI_GROUPS: &str = "get_all_emoji_groups";
    pub const CREATE_SPACE: &str = "create_space";
    pub const GET_SPACE: &str = "get_space";
    pub const GET_SPACES: &str = "get_spaces";
    pub const GET_INVENTORY: &str = "get_inventory";
    pub const EXPORT_PIECE: &str = "export_piece";
    pub const EXPORT_SPACE: &str = "export_space";
}

/// Function names exported by the Ludotheque zome.
pub mod ludotheque_fn {
    pub const CREATE_PLAYSET: &str = "create_playset";
    pub const GET_PLAYSET: &str = "get_playset";
    pub const GET_ALL_PLAYSETS: &str = "get_all_playsets";
    pub const EXPORT_PLAYSET: &str = "export_playset";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPieceInput {
    pub cell_id: CellId,
    #[serde(rename = "pieceEh")]
    pub piece_id: EntryId,
    pub piece_type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpaceInput {
    pub cell_id: CellId,
    #[serde(rename = "spaceEh")]
    pub space_id: SpaceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPlaysetInput {
    pub destination_cell_id: CellId,
    #[serde(rename = "playsetEh")]
    pub playset_id: EntryId,
}

#[derive(Clone)]
pub struct PlaysetProxy {
    inner: ZomeProxy,
}

impl PlaysetProxy {
    pub fn new(gateway: Arc<dyn ZomeGateway>, zome_name: impl Into<String>) -> Self {
        Self {
            inner: ZomeProxy::new(gateway, zome_name),
        }
    }

    pub fn cell_id(&self) -> &CellId {
        self.inner.cell_id()
    }

    pub async fn create_template(&self, template: &Template) -> Result<EntryId> {
        self.inner.call(playset_fn::CREATE_TEMPLATE, template).await
    }

    pub async fn get_template(&self, id: &EntryId) -> Result<Option<Template>> {
        self.inner.call(playset_fn::GET_TEMPLATE, id).await
    }

    pub async fn get_templates(&self) -> Result<Vec<Hashed<EntryId, Template>>> {
        self.inner.call(playset_fn::GET_TEMPLATES, &()).await
    }

    pub async fn create_svg_marker(&self, marker: &SvgMarker) -> Result<EntryId> {
        self.inner.call(playset_fn::CREATE_SVG_MARKER, marker).await
    }

    pub async fn get_svg_marker(&self, id: &EntryId) -> Result<Option<SvgMarker>> {
        self.inner.call(playset_fn::GET_SVG_MARKER, id).await
    }

    pub async fn get_svg_markers(&self) -> Result<Vec<Hashed<EntryId, SvgMarker>>> {
        self.inner.call(playset_fn::GET_SVG_MARKERS, &()).await
    }

    pub async fn create_emoji_group(&self, group: &EmojiGroup) -> Result<EntryId> {
        self.inner.call(playset_fn::CREATE_EMOJI_GROUP, group).await
    }

    pub async fn get_emoji_group(&self, id: &EntryId) -> Result<Option<EmojiGroup>> {
        self.inner.call(playset_fn::GET_EMOJI_GROUP, id).await
    }

    pub async fn get_all_emoji_groups(&self) -> Result<Vec<Hashed<EntryId, EmojiGroup>>> {
        self.inner.call(playset_fn::GET_ALL_EMOJI_GROUPS, &()).await
    }

    pub async fn create_space(&self, space: &Space) -> Result<SpaceId> {
        self.inner.call(playset_fn::CREATE_SPACE, space).await
    }

    pub async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>> {
        self.inner.call(playset_fn::GET_SPACE, id).await
    }

    pub async fn get_spaces(&self) -> Result<Vec<Hashed<SpaceId, Space>>> {
        self.inner.call(playset_fn::GET_SPACES, &()).await
    }

    pub async fn get_inventory(&self) -> Result<Inventory> {
        self.inner.call(playset_fn::GET_INVENTORY, &()).await
    }

    pub async fn export_piece(
        &self,
        piece_id: &EntryId,
        kind: PieceKind,
        destination: &CellId,
    ) -> Result<()> {
        let input = ExportPieceInput {
            cell_id: destination.clone(),
            piece_id: piece_id.clone(),
            piece_type_name: kind.as_str().to_string(),
        };
        self.inner.call(playset_fn::EXPORT_PIECE, &input).await
    }

    pub async fn export_space(
        &self,
        space_id: &SpaceId,
        destination: &CellId,
    ) -> Result<Vec<EntryId>> {
        let input = ExportSpaceInput {
            cell_id: destination.clone(),
            space_id: space_id.clone(),
        };
        self.inner.call(playset_fn::EXPORT_SPACE, &input).await
    }
}

#[derive(Clone)]
pub struct LudothequeProxy {
    inner: ZomeProxy,
}

impl LudothequeProxy {
    pub fn new(gateway: Arc<dyn ZomeGateway>, zome_name: impl Into<String>) -> Self {
        Self {
            inner: ZomeProxy::new(gateway, zome_name),
        }
    }

    pub async fn create_playset(&self, playset: &Playset) -> Result<EntryId> {
        self.inner.call(ludotheque_fn::CREATE_PLAYSET, playset).await
    }

    pub async fn get_playset(&self, id: &EntryId) -> Result<Option<Playset>> {
        self.inner.call(ludotheque_fn::GET_PLAYSET, id).await
    }

    pub async fn get_all_playsets(&self) -> Result<Vec<Hashed<EntryId, Playset>>> {
        self.inner.call(ludotheque_fn::GET_ALL_PLAYSETS, &()).await
    }

    pub async fn export_playset(
        &self,
        playset_id: &EntryId,
        destination: &CellId,
    ) -> Result<Vec<EntryId>> {
        let input = ExportPlaysetInput {
            destination_cell_id: destination.clone(),
            playset_id: playset_id.clone(),
        };
        self.inner.call(ludotheque_fn::EXPORT_PLAYSET, &input).await
    }
}
