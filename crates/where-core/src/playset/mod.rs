//! Playset domain module.
//!
//! Catalog pieces (spaces, templates, svg markers, emoji groups) and the
//! ludotheque's playsets. These records are create-only: there is no update
//! or session semantics, only publish, fetch and export.

mod convert;
mod model;

pub use convert::{dematerialize_space, fields_to_meta, materialize_space, meta_to_fields};
pub use model::{
    EmojiGroup, Hashed, Inventory, LudothequePerspective, MarkerPiece, MarkerType, PieceKind,
    Playset, PlaysetPerspective, Space, SpaceMat, SpaceMeta, SvgMarker, Template, UiBox, UiItem,
    count_inventory,
};
