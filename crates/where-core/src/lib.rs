//! Domain layer of the Where view-models.
//!
//! Identifiers, cache models, wire records and their converters, the signal
//! sum type, presence derivation, configuration, and the two ports through
//! which every backend interaction flows.

pub mod config;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod meta_field;
pub mod placement;
pub mod playset;
pub mod presence;
pub mod signal;

pub use config::{PresenceConfig, WhereConfig};
pub use error::{Result, WhereError};
pub use ids::{AgentId, CellId, DnaId, EntryId, LinkId, SessionId, SpaceId};
