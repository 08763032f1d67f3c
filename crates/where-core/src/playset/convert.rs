//! Conversions between Space entries and their materialized form.

use super::model::{Space, SpaceMat, SpaceMeta};
use crate::error::{Result, WhereError};
use crate::meta_field::{FieldOutcome, MetaFields, decode_field, encode_field, js_map};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Default, Serialize, Deserialize)]
#[serde(transparent)]
struct SubMap(#[serde(with = "js_map")] BTreeMap<String, String>);

/// Decodes a Space entry. A malformed surface fails the whole record; a
/// malformed metadata field only resets that field to its default.
pub fn materialize_space(entry: &Space) -> Result<SpaceMat> {
    let surface = serde_json::from_str(&entry.surface).map_err(|e| {
        WhereError::json(format!("Space '{}' has an unreadable surface: {}", entry.name, e))
    })?;
    let meta = match &entry.meta {
        Some(fields) => fields_to_meta(&entry.name, fields),
        None => SpaceMeta::default(),
    };
    Ok(SpaceMat {
        name: entry.name.clone(),
        origin: entry.origin.clone(),
        surface,
        maybe_marker_piece: entry.maybe_marker_piece.clone(),
        meta,
    })
}

pub fn dematerialize_space(space: &SpaceMat) -> Space {
    Space {
        name: space.name.clone(),
        origin: space.origin.clone(),
        surface: space.surface.to_string(),
        maybe_marker_piece: space.maybe_marker_piece.clone(),
        meta: Some(meta_to_fields(&space.meta)),
    }
}

pub fn meta_to_fields(meta: &SpaceMeta) -> MetaFields {
    let mut fields = MetaFields::new();
    encode_field(&mut fields, "ui", &meta.ui);
    encode_field(&mut fields, "subMap", &SubMap(meta.sub_map.clone()));
    encode_field(&mut fields, "markerType", &meta.marker_type);
    encode_field(&mut fields, "singleEmoji", &meta.single_emoji);
    encode_field(&mut fields, "multi", &meta.multi);
    encode_field(&mut fields, "canTag", &meta.can_tag);
    encode_field(&mut fields, "tagVisible", &meta.tag_visible);
    encode_field(&mut fields, "tagAsMarker", &meta.tag_as_marker);
    encode_field(&mut fields, "predefinedTags", &meta.predefined_tags);
    encode_field(&mut fields, "sessionCount", &meta.session_count);
    encode_field(&mut fields, "canModifyPast", &meta.can_modify_past);
    encode_field(&mut fields, "sessionLabels", &meta.session_labels);
    fields
}

pub fn fields_to_meta(record: &str, fields: &MetaFields) -> SpaceMeta {
    let mut meta = SpaceMeta::default();
    for (key, raw) in fields {
        match key.as_str() {
            "ui" => assign(record, &mut meta.ui, key, raw),
            "subMap" => {
                let mut sub_map = SubMap(std::mem::take(&mut meta.sub_map));
                assign(record, &mut sub_map, key, raw);
                meta.sub_map = sub_map.0;
            }
            "markerType" => assign(record, &mut meta.marker_type, key, raw),
            "singleEmoji" => assign(record, &mut meta.single_emoji, key, raw),
            "multi" => assign(record, &mut meta.multi, key, raw),
            "canTag" => assign(record, &mut meta.can_tag, key, raw),
            "tagVisible" => assign(record, &mut meta.tag_visible, key, raw),
            "tagAsMarker" => assign(record, &mut meta.tag_as_marker, key, raw),
            "predefinedTags" => assign(record, &mut meta.predefined_tags, key, raw),
            "sessionCount" => assign(record, &mut meta.session_count, key, raw),
            "canModifyPast" => assign(record, &mut meta.can_modify_past, key, raw),
            "sessionLabels" => assign(record, &mut meta.session_labels, key, raw),
            other => tracing::debug!("Ignoring unknown space meta field '{}' in {}", other, record),
        }
    }
    meta
}

/// Overwrites `slot` only when the field decodes; otherwise the space default stays.
fn assign<T>(record: &str, slot: &mut T, key: &str, raw: &str)
where
    T: DeserializeOwned + Default,
{
    match decode_field::<T>(key, raw) {
        FieldOutcome::Ok(value) => *slot = value,
        FieldOutcome::Malformed { key, error, .. } => {
            tracing::warn!(
                "Malformed space meta field '{}' in {}, keeping default: {}",
                key,
                record,
                error
            );
        }
    }
}
