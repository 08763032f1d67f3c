//! Conversions between Here wire records and materialized Locations.

use super::bindings::{HereEntry, HereOutput};
use super::model::{Coord, Location, LocationInfo, LocationMeta};
use crate::error::{Result, WhereError};
use crate::meta_field::{FieldOutcome, MetaFields, decode_field, encode_field};
use serde_json::Value;

/// Decodes a placement record.
///
/// The coordinate is mandatory: an unreadable one fails the record. Metadata
/// is decoded field by field and a malformed field only loses itself.
pub fn materialize_here(output: &HereOutput) -> Result<LocationInfo> {
    let coord: Coord = serde_json::from_str(&output.entry.value).map_err(|e| {
        WhereError::json(format!(
            "Here {} has an unreadable coordinate: {}",
            output.link_id, e
        ))
    })?;
    let record = format!("here {}", output.link_id);
    Ok(LocationInfo {
        location: Location {
            coord,
            session_id: output.entry.session_id.clone(),
            meta: fields_to_location_meta(&record, &output.entry.meta),
        },
        link_id: output.link_id.clone(),
        author: output.author.clone(),
    })
}

pub fn dematerialize_here(location: &Location) -> HereEntry {
    HereEntry {
        value: serde_json::json!({ "x": location.coord.x, "y": location.coord.y }).to_string(),
        session_id: location.session_id.clone(),
        meta: location_meta_to_fields(&location.meta),
    }
}

pub fn location_meta_to_fields(meta: &LocationMeta) -> MetaFields {
    let mut fields = MetaFields::new();
    encode_field(&mut fields, "markerType", &meta.marker_type);
    encode_field(&mut fields, "tag", &meta.tag);
    encode_field(&mut fields, "img", &meta.img);
    encode_field(&mut fields, "color", &meta.color);
    encode_field(&mut fields, "authorName", &meta.author_name);
    encode_field(&mut fields, "emoji", &meta.emoji);
    encode_field(&mut fields, "svgMarker", &meta.svg_marker);
    for (key, value) in &meta.extra {
        encode_field(&mut fields, key, value);
    }
    fields
}

pub fn fields_to_location_meta(record: &str, fields: &MetaFields) -> LocationMeta {
    let mut meta = LocationMeta::default();
    for (key, raw) in fields {
        match key.as_str() {
            "markerType" => meta.marker_type = decode_field(key, raw).into_value(record),
            "tag" => meta.tag = decode_field(key, raw).into_value(record),
            "img" => meta.img = decode_field(key, raw).into_value(record),
            "color" => meta.color = decode_field(key, raw).into_value(record),
            "authorName" => meta.author_name = decode_field(key, raw).into_value(record),
            "emoji" => meta.emoji = decode_field(key, raw).into_value(record),
            "svgMarker" => meta.svg_marker = decode_field(key, raw).into_value(record),
            _ => match decode_field::<Value>(key, raw) {
                FieldOutcome::Ok(Value::Null) => {}
                FieldOutcome::Ok(value) => {
                    meta.extra.insert(key.clone(), value);
                }
                malformed => {
                    malformed.into_value(record);
                }
            },
        }
    }
    meta
}
