//! Field mapping tables
//!
//! Static compile-time tables that map public search parameters to catalog
//! (CMR) parameters, and canonical feature properties to extraction paths in
//! UMM granule records. Built once, shared read-only.

use crate::error::{Error, Result};
use crate::path::{Cast, PathStep};
use phf::phf_map;
use PathStep::{Field, Index, Match};

/// How a public search parameter is sent to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapEntry {
    /// Catalog parameter name. `None` for parameters that are rewritten into
    /// other parameters and never sent themselves.
    pub backend_key: Option<&'static str>,
    /// Value template; `{0}` is replaced by the rendered value.
    pub template: &'static str,
}

impl FieldMapEntry {
    const fn sent(backend_key: &'static str, template: &'static str) -> Self {
        Self {
            backend_key: Some(backend_key),
            template,
        }
    }

    const fn consumed() -> Self {
        Self {
            backend_key: None,
            template: "{0}",
        }
    }

    pub fn render(&self, value: &str) -> String {
        self.template.replace("{0}", value)
    }
}

/// Public search parameter -> catalog parameter and format template.
static SEARCH_FIELDS: phf::Map<&'static str, FieldMapEntry> = phf_map! {
    "absoluteOrbit" => FieldMapEntry::sent("orbit_number", "{0}"),
    "asfFrame" => FieldMapEntry::sent("attribute[]", "int,FRAME_NUMBER,{0}"),
    "beamMode" => FieldMapEntry::sent("attribute[]", "string,BEAM_MODE,{0}"),
    "beamSwath" => FieldMapEntry::sent("attribute[]", "string,BEAM_MODE_TYPE,{0}"),
    "collectionName" => FieldMapEntry::sent("attribute[]", "string,MISSION_NAME,{0}"),
    "maxDoppler" => FieldMapEntry::sent("attribute[]", "float,DOPPLER,,{0}"),
    "minDoppler" => FieldMapEntry::sent("attribute[]", "float,DOPPLER,{0},"),
    "maxFaradayRotation" => FieldMapEntry::sent("attribute[]", "float,FARADAY_ROTATION,,{0}"),
    "minFaradayRotation" => FieldMapEntry::sent("attribute[]", "float,FARADAY_ROTATION,{0},"),
    "flightDirection" => FieldMapEntry::sent("attribute[]", "string,ASCENDING_DESCENDING,{0}"),
    "flightLine" => FieldMapEntry::sent("attribute[]", "string,FLIGHT_LINE,{0}"),
    "frame" => FieldMapEntry::sent("attribute[]", "int,CENTER_ESA_FRAME,{0}"),
    "granule_list" => FieldMapEntry::sent("readable_granule_name[]", "{0}"),
    "product_list" => FieldMapEntry::sent("granule_ur[]", "{0}"),
    "groupID" => FieldMapEntry::sent("attribute[]", "string,GROUP_ID,{0}"),
    "insarStackId" => FieldMapEntry::sent("attribute[]", "int,INSAR_STACK_ID,{0}"),
    "instrument" => FieldMapEntry::sent("instrument[]", "{0}"),
    "lookDirection" => FieldMapEntry::sent("attribute[]", "string,LOOK_DIRECTION,{0}"),
    "offNadirAngle" => FieldMapEntry::sent("attribute[]", "float,OFF_NADIR_ANGLE,{0}"),
    "platform" => FieldMapEntry::sent("platform[]", "{0}"),
    "polarization" => FieldMapEntry::sent("attribute[]", "string,POLARIZATION,{0}"),
    "processingLevel" => FieldMapEntry::sent("attribute[]", "string,PROCESSING_TYPE,{0}"),
    "relativeOrbit" => FieldMapEntry::sent("attribute[]", "int,PATH_NUMBER,{0}"),
    "processingDate" => FieldMapEntry::sent("updated_since", "{0}"),
    "temporal" => FieldMapEntry::sent("temporal", "{0}"),
    "start" => FieldMapEntry::consumed(),
    "end" => FieldMapEntry::consumed(),
    "season" => FieldMapEntry::consumed(),
    "intersectsWith" => FieldMapEntry::consumed(),
    // Installed by unpacking `intersectsWith`
    "polygon" => FieldMapEntry::sent("polygon", "{0}"),
    "linestring" => FieldMapEntry::sent("line", "{0}"),
    "point" => FieldMapEntry::sent("point", "{0}"),
    "bbox" => FieldMapEntry::sent("bounding_box", "{0}"),
};

/// Parameters accepted as a bare scalar or a list; scalars are wrapped.
pub const LISTIFY_PARAMS: &[&str] = &[
    "absoluteOrbit",
    "asfFrame",
    "beamMode",
    "beamSwath",
    "collectionName",
    "flightLine",
    "frame",
    "granule_list",
    "groupID",
    "insarStackId",
    "instrument",
    "lookDirection",
    "offNadirAngle",
    "platform",
    "polarization",
    "processingLevel",
    "product_list",
    "relativeOrbit",
];

/// Numbers and `(min, max)` ranges, flattened into one comma-joined value.
pub const NUMERIC_RANGE_PARAMS: &[&str] = &[
    "absoluteOrbit",
    "asfFrame",
    "frame",
    "offNadirAngle",
    "relativeOrbit",
];

/// Lists sent as a single comma-joined value.
pub const JOINED_PARAMS: &[&str] = &["collectionName", "groupID"];

/// Lists attached verbatim to every subquery instead of multiplying them.
pub const BROADCAST_PARAMS: &[&str] = &["platform", "instrument"];

/// Identifier lists that are deduplicated and split into bounded chunks.
pub const CHUNKED_PARAMS: &[&str] = &["granule_list", "product_list"];

/// Largest number of identifiers sent in one request.
pub const CHUNK_SIZE: usize = 500;

/// Spatial filter parameter, written as `<shape>:<value>`.
pub const INTERSECTS_WITH: &str = "intersectsWith";

/// Shape parameters `intersectsWith` may unpack into.
pub const SHAPE_TYPES: &[&str] = &["polygon", "linestring", "point", "bbox"];

/// Look up the mapping for a public parameter name.
pub fn lookup(name: &str) -> Result<&'static FieldMapEntry> {
    SEARCH_FIELDS
        .get(name)
        .ok_or_else(|| Error::UnknownParameter(name.to_string()))
}

pub fn is_known(name: &str) -> bool {
    SEARCH_FIELDS.contains_key(name)
}

/// One canonical feature property and where it lives in a UMM record.
#[derive(Debug, Clone, Copy)]
pub struct OutputField {
    pub name: &'static str,
    pub cast: Cast,
    pub path: &'static [PathStep<'static>],
}

const fn output(
    name: &'static str,
    cast: Cast,
    path: &'static [PathStep<'static>],
) -> OutputField {
    OutputField { name, cast, path }
}

macro_rules! additional_attribute {
    ($name:literal) => {
        &[
            Field("AdditionalAttributes"),
            Match("Name", $name),
            Field("Values"),
            Index(0),
        ]
    };
}

/// Canonical property -> UMM extraction path.
pub const OUTPUT_FIELDS: &[OutputField] = &[
    output("beamModeType", Cast::Text, additional_attribute!("BEAM_MODE_TYPE")),
    output(
        "browse",
        Cast::Text,
        &[Field("RelatedUrls"), Match("Type", "GET RELATED VISUALIZATION"), Field("URL")],
    ),
    output("bytes", Cast::Int, additional_attribute!("BYTES")),
    output("centerLat", Cast::Float, additional_attribute!("CENTER_LAT")),
    output("centerLon", Cast::Float, additional_attribute!("CENTER_LON")),
    output("faradayRotation", Cast::Float, additional_attribute!("FARADAY_ROTATION")),
    output("fileID", Cast::Text, &[Field("GranuleUR")]),
    output("flightDirection", Cast::Text, additional_attribute!("FLIGHT_DIRECTION")),
    output("groupID", Cast::Text, additional_attribute!("GROUP_ID")),
    output("granuleType", Cast::Text, additional_attribute!("GRANULE_TYPE")),
    output("insarStackId", Cast::Text, additional_attribute!("INSAR_STACK_ID")),
    output("md5sum", Cast::Text, additional_attribute!("MD5SUM")),
    output("offNadirAngle", Cast::Float, additional_attribute!("OFF_NADIR_ANGLE")),
    output(
        "orbit",
        Cast::Int,
        &[Field("OrbitCalculatedSpatialDomains"), Index(0), Field("OrbitNumber")],
    ),
    output("pathNumber", Cast::Int, additional_attribute!("PATH_NUMBER")),
    output("platform", Cast::Text, additional_attribute!("ASF_PLATFORM")),
    output("pointingAngle", Cast::Float, additional_attribute!("POINTING_ANGLE")),
    output("polarization", Cast::Text, additional_attribute!("POLARIZATION")),
    output(
        "processingDate",
        Cast::Text,
        &[Field("DataGranule"), Field("ProductionDateTime")],
    ),
    output("processingLevel", Cast::Text, additional_attribute!("PROCESSING_TYPE")),
    output(
        "sceneName",
        Cast::Text,
        &[
            Field("DataGranule"),
            Field("Identifiers"),
            Match("IdentifierType", "ProducerGranuleId"),
            Field("Identifier"),
        ],
    ),
    output(
        "sensor",
        Cast::Text,
        &[Field("Platforms"), Index(0), Field("Instruments"), Index(0), Field("ShortName")],
    ),
    output(
        "startTime",
        Cast::Text,
        &[Field("TemporalExtent"), Field("RangeDateTime"), Field("BeginningDateTime")],
    ),
    output(
        "stopTime",
        Cast::Text,
        &[Field("TemporalExtent"), Field("RangeDateTime"), Field("EndingDateTime")],
    ),
    output(
        "url",
        Cast::Text,
        &[Field("RelatedUrls"), Match("Type", "GET DATA"), Field("URL")],
    ),
];

/// Platforms whose frame number is the ASF frame rather than the ESA center frame.
pub const ASF_FRAME_PLATFORMS: &[&str] = &["Sentinel-1A", "Sentinel-1B", "ALOS"];

pub const ASF_FRAME_PATH: &[PathStep<'static>] = additional_attribute!("FRAME_NUMBER");

pub const ESA_FRAME_PATH: &[PathStep<'static>] = additional_attribute!("CENTER_ESA_FRAME");

/// Boundary points of the first granule polygon.
pub const POLYGON_POINTS_PATH: &[PathStep<'static>] = &[
    Field("SpatialExtent"),
    Field("HorizontalSpatialDomain"),
    Field("Geometry"),
    Field("GPolygons"),
    Index(0),
    Field("Boundary"),
    Field("Points"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        let entry = lookup("beamMode").unwrap();
        assert_eq!(entry.backend_key, Some("attribute[]"));
        assert_eq!(entry.render("IW"), "string,BEAM_MODE,IW");

        assert!(matches!(lookup("nope"), Err(Error::UnknownParameter(name)) if name == "nope"));
    }

    #[test]
    fn test_consumed_parameters_have_no_backend_key() {
        for name in ["start", "end", "season", INTERSECTS_WITH] {
            assert_eq!(lookup(name).unwrap().backend_key, None, "{}", name);
        }
    }

    #[test]
    fn test_parameter_classes_are_known() {
        for class in [
            LISTIFY_PARAMS,
            NUMERIC_RANGE_PARAMS,
            JOINED_PARAMS,
            BROADCAST_PARAMS,
            CHUNKED_PARAMS,
            SHAPE_TYPES,
        ] {
            for name in class {
                assert!(is_known(name), "{} missing from field map", name);
            }
        }
    }

    #[test]
    fn test_range_templates_leave_other_bound_empty() {
        assert_eq!(lookup("minDoppler").unwrap().render("1.5"), "float,DOPPLER,1.5,");
        assert_eq!(lookup("maxDoppler").unwrap().render("1.5"), "float,DOPPLER,,1.5");
    }

    #[test]
    fn test_output_field_names_are_unique() {
        let mut names: Vec<&str> = OUTPUT_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OUTPUT_FIELDS.len());
    }
}
