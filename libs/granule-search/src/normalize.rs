//! Canonical granule features
//!
//! Raw UMM granule records are flattened into a fixed property schema through
//! the output field table. Missing or "no data" values become `null`.

use crate::error::Result;
use crate::field_map::{
    ASF_FRAME_PATH, ASF_FRAME_PLATFORMS, ESA_FRAME_PATH, OUTPUT_FIELDS, POLYGON_POINTS_PATH,
};
use crate::path::{as_float, extract, extract_with, Cast, PathStep};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Polygon geometry as GeoJSON orders it: rings of `[longitude, latitude]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Polygon")]
pub struct Polygon {
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

/// Normalized granule properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleProperties {
    pub beam_mode_type: Option<String>,
    pub browse: Option<String>,
    pub bytes: Option<i64>,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    pub faraday_rotation: Option<f64>,
    #[serde(rename = "fileID")]
    pub file_id: Option<String>,
    pub file_name: Option<String>,
    pub flight_direction: Option<String>,
    pub frame_number: Option<i64>,
    #[serde(rename = "groupID")]
    pub group_id: Option<String>,
    pub granule_type: Option<String>,
    pub insar_stack_id: Option<String>,
    pub md5sum: Option<String>,
    pub off_nadir_angle: Option<f64>,
    pub orbit: Option<i64>,
    pub path_number: Option<i64>,
    pub platform: Option<String>,
    pub pointing_angle: Option<f64>,
    pub polarization: Option<String>,
    pub processing_date: Option<String>,
    pub processing_level: Option<String>,
    pub scene_name: Option<String>,
    pub sensor: Option<String>,
    pub start_time: Option<String>,
    pub stop_time: Option<String>,
    pub url: Option<String>,
}

/// One granule as a GeoJSON feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct GranuleFeature {
    pub geometry: Polygon,
    pub properties: GranuleProperties,
}

/// Features collected from a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<GranuleFeature>,
}

impl FromIterator<GranuleFeature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = GranuleFeature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Normalize one catalog record. Accepts either the full `{meta, umm}` item
/// or the bare `umm` document.
pub fn normalize(raw: &Value) -> Result<GranuleFeature> {
    let umm = raw.get("umm").unwrap_or(raw);

    let mut properties = Map::new();
    for field in OUTPUT_FIELDS {
        let value = extract(umm, field.path)
            .and_then(|v| field.cast.apply(v))
            .unwrap_or(Value::Null);
        properties.insert(field.name.to_string(), value);
    }

    let file_name = properties
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| url.rsplit('/').next())
        .map(|name| Value::String(name.to_string()))
        .unwrap_or(Value::Null);
    properties.insert("fileName".to_string(), file_name);

    let frame_path = match properties.get("platform").and_then(Value::as_str) {
        Some(platform) if ASF_FRAME_PLATFORMS.contains(&platform) => ASF_FRAME_PATH,
        _ => ESA_FRAME_PATH,
    };
    let frame_number = extract(umm, frame_path)
        .and_then(|v| Cast::Int.apply(v))
        .unwrap_or(Value::Null);
    properties.insert("frameNumber".to_string(), frame_number);

    Ok(GranuleFeature {
        geometry: polygon(umm),
        properties: serde_json::from_value(Value::Object(properties))?,
    })
}

fn polygon(umm: &Value) -> Polygon {
    let ring: Vec<[f64; 2]> = extract(umm, POLYGON_POINTS_PATH)
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|point| {
                    let lon = extract_with(point, &[PathStep::Field("Longitude")], as_float)?;
                    let lat = extract_with(point, &[PathStep::Field("Latitude")], as_float)?;
                    Some([lon, lat])
                })
                .collect()
        })
        .unwrap_or_default();

    if ring.is_empty() {
        Polygon::default()
    } else {
        Polygon {
            coordinates: vec![ring],
        }
    }
}
