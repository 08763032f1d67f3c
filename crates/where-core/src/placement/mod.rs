//! Placement domain module.
//!
//! # Module Structure
//!
//! - `model`: materialized cache types (`LocationInfo`, `PlacementSession`, `PlayManifest`, `WherePerspective`, `Play`)
//! - `bindings`: wire records exchanged with the Where zome
//! - `convert`: `materialize_here` / `dematerialize_here`

mod bindings;
mod convert;
mod model;

pub use bindings::{
    AddHereInput, CreateNextSessionInput, HereEntry, HereOutput, PlacementSessionEntry,
    SpaceSessionsInput,
};
pub use convert::{
    dematerialize_here, fields_to_location_meta, location_meta_to_fields, materialize_here,
};
pub use model::{
    Coord, Location, LocationInfo, LocationMeta, PlacementSession, Play, PlayManifest,
    WherePerspective,
};
