//! Search parameter translation
//!
//! Turns public search parameters into catalog key/value pairs. The steps are
//! order-sensitive:
//!
//! 1. scalars of list-capable parameters are wrapped into single-item lists
//! 2. numeric parameters are flattened into `"1,2,3-5"` strings
//! 3. joinable lists are collapsed into one comma-separated value
//! 4. `intersectsWith` is unpacked into its shape parameter, and
//!    `start`/`end`/`season` are rewritten into `temporal`
//! 5. every remaining parameter is rendered through its field map template,
//!    one pair per list item
//!
//! Every name is checked against the field map before anything else happens.

use crate::error::{Error, Result};
use crate::field_map::{
    self, INTERSECTS_WITH, JOINED_PARAMS, LISTIFY_PARAMS, NUMERIC_RANGE_PARAMS, SHAPE_TYPES,
};
use crate::params::{join, ParamValue, Scalar, SearchParams};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A catalog parameter ready to be form-encoded.
pub type BackendPair = (String, String);

/// Run the full translation of a parameter set.
pub fn translate(params: SearchParams) -> Result<Vec<BackendPair>> {
    let params = normalize_params(params)?;
    let mut pairs = Vec::new();
    for (name, value) in params.iter() {
        pairs.extend(translate_param(name, value)?);
    }
    Ok(pairs)
}

/// Apply steps 1-4, leaving values in the shape the subquery decomposer and
/// [`translate_param`] expect.
pub fn normalize_params(params: SearchParams) -> Result<SearchParams> {
    for name in params.names() {
        field_map::lookup(name)?;
    }

    let mut params: SearchParams = params
        .into_iter()
        .map(|(name, value)| {
            let value = if LISTIFY_PARAMS.contains(&name.as_str()) {
                listify(value)
            } else {
                value
            };
            (name, value)
        })
        .collect();

    for name in NUMERIC_RANGE_PARAMS {
        if let Some(value) = params.get(name) {
            let flattened = flatten_list(value.items()).map_err(|e| annotate(e, name))?;
            params.insert(*name, flattened);
        }
    }

    for name in JOINED_PARAMS {
        if let Some(value) = params.get(name) {
            let joined = join(value.items(), ",");
            params.insert(*name, joined);
        }
    }

    unpack_intersects_with(&mut params)?;
    rewrite_temporal(&mut params)?;

    if let Some(value) = params.get("processingDate") {
        let date = normalize_date("processingDate", value)?;
        params.insert("processingDate", date);
    }

    Ok(params)
}

/// Render one parameter through its field map entry.
///
/// A list-valued parameter produces one pair per item, all sharing the same
/// catalog key. Parameters without a catalog key produce nothing.
pub fn translate_param(name: &str, value: &ParamValue) -> Result<Vec<BackendPair>> {
    let entry = field_map::lookup(name)?;
    let Some(key) = entry.backend_key else {
        return Ok(Vec::new());
    };

    Ok(value
        .items()
        .iter()
        .map(|item| (key.to_string(), entry.render(&item.to_string())))
        .collect())
}

/// Convert numbers and inclusive `(min, max)` ranges into a comma-separated
/// string, e.g. `[1, 2, (3, 5)]` -> `"1,2,3-5"`.
pub fn flatten_list(items: &[ParamValue]) -> Result<String> {
    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        match item {
            ParamValue::Range(bounds) => {
                let (min, max) = range_bounds(bounds)?;
                if min > max {
                    return Err(Error::InvalidRange(format!(
                        "min must be less than max when using min/max tuples to search: ({})",
                        join(bounds, ", ")
                    )));
                }
                rendered.push(format!("{}-{}", bounds[0], bounds[1]));
            }
            ParamValue::Scalar(scalar) => {
                let number = scalar.as_f64().ok_or_else(|| {
                    Error::InvalidValue(format!(
                        "expected number or min/max tuple, got {:?}",
                        scalar
                    ))
                })?;
                if !number.is_finite() {
                    return Err(Error::NonFinite(scalar.to_string()));
                }
                rendered.push(scalar.to_string());
            }
            ParamValue::List(_) => {
                return Err(Error::InvalidValue(format!(
                    "expected number or min/max tuple, got list [{}]",
                    item
                )));
            }
        }
    }
    Ok(rendered.join(","))
}

fn range_bounds(bounds: &[Scalar]) -> Result<(f64, f64)> {
    match bounds {
        [min, max] => Ok((bound(min, "min", bounds)?, bound(max, "max", bounds)?)),
        _ if bounds.len() < 2 => Err(Error::InvalidRange(format!(
            "not enough values in min/max tuple: ({})",
            join(bounds, ", ")
        ))),
        _ => Err(Error::InvalidRange(format!(
            "too many values in min/max tuple: ({})",
            join(bounds, ", ")
        ))),
    }
}

fn bound(value: &Scalar, which: &str, bounds: &[Scalar]) -> Result<f64> {
    let number = value.as_f64().ok_or_else(|| {
        Error::InvalidRange(format!(
            "expected numeric {} in tuple, got {:?}: ({})",
            which,
            value,
            join(bounds, ", ")
        ))
    })?;
    if !number.is_finite() {
        return Err(Error::NonFinite(format!(
            "{} {} in min/max tuple ({})",
            which,
            value,
            join(bounds, ", ")
        )));
    }
    Ok(number)
}

fn listify(value: ParamValue) -> ParamValue {
    match value {
        ParamValue::List(_) => value,
        other => ParamValue::List(vec![other]),
    }
}

fn annotate(error: Error, name: &str) -> Error {
    match error {
        Error::InvalidRange(msg) => Error::InvalidRange(format!("{}: {}", name, msg)),
        Error::NonFinite(msg) => Error::NonFinite(format!("{}: {}", name, msg)),
        Error::InvalidValue(msg) => Error::InvalidValue(format!("{}: {}", name, msg)),
        other => other,
    }
}

/// `intersectsWith = "polygon:1,2,3,4,..."` becomes `polygon = "1,2,3,4,..."`.
fn unpack_intersects_with(params: &mut SearchParams) -> Result<()> {
    let Some(value) = params.remove(INTERSECTS_WITH) else {
        return Ok(());
    };

    let text = value
        .as_scalar()
        .and_then(Scalar::as_str)
        .ok_or_else(|| {
            Error::InvalidValue(format!("{} must be a string, got {}", INTERSECTS_WITH, value))
        })?;
    let (shape_type, shape) = text.split_once(':').ok_or_else(|| {
        Error::InvalidValue(format!(
            "{} must look like '<shape>:<coordinates>', got '{}'",
            INTERSECTS_WITH, text
        ))
    })?;

    if !SHAPE_TYPES.contains(&shape_type) {
        return Err(Error::UnknownParameter(shape_type.to_string()));
    }

    params.insert(shape_type, shape);
    Ok(())
}

/// Fold `start`, `end` and `season` into a single `temporal` value.
fn rewrite_temporal(params: &mut SearchParams) -> Result<()> {
    let start = params.remove("start");
    let end = params.remove("end");
    let season = params.remove("season");

    if start.is_none() && end.is_none() {
        if season.is_some() {
            return Err(Error::InvalidValue(
                "season requires a start or end date".into(),
            ));
        }
        return Ok(());
    }

    let start = start
        .map(|v| normalize_date("start", &v))
        .transpose()?
        .unwrap_or_default();
    let end = end
        .map(|v| normalize_date("end", &v))
        .transpose()?
        .unwrap_or_default();

    let mut temporal = format!("{},{}", start, end);
    if let Some(season) = season {
        let (first, last) = season_days(&season)?;
        temporal.push_str(&format!(",{},{}", first, last));
    }

    params.insert("temporal", temporal);
    Ok(())
}

fn season_days(value: &ParamValue) -> Result<(i64, i64)> {
    fn day(value: &Scalar) -> Option<i64> {
        match value {
            Scalar::Int(d) if (1..=366).contains(d) => Some(*d),
            _ => None,
        }
    }

    let days: Option<Vec<&Scalar>> = match value {
        ParamValue::Range(bounds) => Some(bounds.iter().collect()),
        ParamValue::List(items) => items.iter().map(ParamValue::as_scalar).collect(),
        ParamValue::Scalar(_) => None,
    };

    match days.as_deref() {
        Some([first, last]) => match (day(first), day(last)) {
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Err(Error::InvalidValue(format!(
                "season days must be integers between 1 and 366, got {}",
                value
            ))),
        },
        _ => Err(Error::InvalidValue(format!(
            "season must be a pair of days of year, got {}",
            value
        ))),
    }
}

/// Render a date parameter as an ISO-8601 UTC timestamp.
fn normalize_date(name: &str, value: &ParamValue) -> Result<String> {
    let text = value.as_scalar().and_then(Scalar::as_str).ok_or_else(|| {
        Error::InvalidValue(format!("{} must be a date string, got {}", name, value))
    })?;

    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.and_utc())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        })
        .map_err(|_| Error::InvalidValue(format!("{} is not a valid date: '{}'", name, text)))?;

    Ok(parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<BackendPair> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_flatten_numbers_and_ranges() {
        let items = vec![
            ParamValue::from(1_i64),
            ParamValue::from(2_i64),
            ParamValue::range(3_i64, 5_i64),
        ];
        assert_eq!(flatten_list(&items).unwrap(), "1,2,3-5");
    }

    #[test]
    fn test_flatten_floats() {
        let items = vec![ParamValue::range(20.5, 21.25), ParamValue::from(30.5)];
        assert_eq!(flatten_list(&items).unwrap(), "20.5-21.25,30.5");
    }

    #[test]
    fn test_flatten_rejects_inverted_range() {
        let items = vec![ParamValue::range(5_i64, 3_i64)];
        assert!(matches!(flatten_list(&items), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_flatten_rejects_non_finite() {
        assert!(matches!(
            flatten_list(&[ParamValue::from(f64::NAN)]),
            Err(Error::NonFinite(_))
        ));
        assert!(matches!(
            flatten_list(&[ParamValue::range(1.0, f64::INFINITY)]),
            Err(Error::NonFinite(_))
        ));
    }

    #[test]
    fn test_flatten_rejects_bad_arity() {
        let short = ParamValue::Range(vec![Scalar::Int(1)]);
        let long = ParamValue::Range(vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]);
        assert!(matches!(flatten_list(&[short]), Err(Error::InvalidRange(_))));
        assert!(matches!(flatten_list(&[long]), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_flatten_rejects_non_numeric() {
        assert!(matches!(
            flatten_list(&[ParamValue::range("a", 2_i64)]),
            Err(Error::InvalidRange(_))
        ));
        assert!(matches!(
            flatten_list(&[ParamValue::from("12")]),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            flatten_list(&[ParamValue::from(true)]),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_translate_scalar_and_list() {
        let params = SearchParams::new()
            .with("beamMode", ParamValue::list(["IW", "EW"]))
            .with("flightDirection", "ASCENDING");

        assert_eq!(
            translate(params).unwrap(),
            pairs(&[
                ("attribute[]", "string,BEAM_MODE,IW"),
                ("attribute[]", "string,BEAM_MODE,EW"),
                ("attribute[]", "string,ASCENDING_DESCENDING,ASCENDING"),
            ])
        );
    }

    #[test]
    fn test_translate_flattens_numeric_params() {
        let params = SearchParams::new().with(
            "relativeOrbit",
            ParamValue::List(vec![ParamValue::from(1_i64), ParamValue::range(3_i64, 5_i64)]),
        );
        assert_eq!(
            translate(params).unwrap(),
            pairs(&[("attribute[]", "int,PATH_NUMBER,1,3-5")])
        );
    }

    #[test]
    fn test_translate_joins_joinable_params() {
        let params = SearchParams::new().with("collectionName", ParamValue::list(["A", "B"]));
        assert_eq!(
            translate(params).unwrap(),
            pairs(&[("attribute[]", "string,MISSION_NAME,A,B")])
        );
    }

    #[test]
    fn test_translate_unpacks_intersects_with() {
        let params = SearchParams::new()
            .with("intersectsWith", "polygon:-150.2,65.0,-150.1,65.5,-150.2,65.0");
        assert_eq!(
            translate(params).unwrap(),
            pairs(&[("polygon", "-150.2,65.0,-150.1,65.5,-150.2,65.0")])
        );
    }

    #[test]
    fn test_intersects_with_splits_on_first_colon() {
        let params = SearchParams::new().with("intersectsWith", "point:1:2");
        assert_eq!(translate(params).unwrap(), pairs(&[("point", "1:2")]));
    }

    #[test]
    fn test_intersects_with_unknown_shape() {
        let params = SearchParams::new().with("intersectsWith", "circle:1,2,3");
        assert!(matches!(translate(params), Err(Error::UnknownParameter(s)) if s == "circle"));

        let params = SearchParams::new().with("intersectsWith", "no-colon");
        assert!(matches!(translate(params), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_unknown_parameter_fails() {
        let params = SearchParams::new()
            .with("platform", "ALOS")
            .with("notAParam", 1_i64);
        let err = translate(params).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, Error::UnknownParameter(name) if name == "notAParam"));
    }

    #[test]
    fn test_temporal_rewrite() {
        let params = SearchParams::new()
            .with("start", "2020-01-01")
            .with("end", "2020-06-30T12:00:00Z")
            .with("season", ParamValue::list([32_i64, 90_i64]));
        assert_eq!(
            translate(params).unwrap(),
            pairs(&[(
                "temporal",
                "2020-01-01T00:00:00Z,2020-06-30T12:00:00Z,32,90"
            )])
        );
    }

    #[test]
    fn test_temporal_open_ended() {
        let params = SearchParams::new().with("start", "2021-03-04T05:06:07+02:00");
        assert_eq!(
            translate(params).unwrap(),
            pairs(&[("temporal", "2021-03-04T03:06:07Z,")])
        );
    }

    #[test]
    fn test_temporal_errors() {
        let season_only = SearchParams::new().with("season", ParamValue::list([1_i64, 30_i64]));
        assert!(matches!(translate(season_only), Err(Error::InvalidValue(_))));

        let bad_date = SearchParams::new().with("start", "yesterday");
        assert!(matches!(translate(bad_date), Err(Error::InvalidValue(_))));

        let bad_season = SearchParams::new()
            .with("start", "2020-01-01")
            .with("season", ParamValue::list([0_i64, 400_i64]));
        assert!(matches!(translate(bad_season), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_translate_param_renders_each_item() {
        let value = ParamValue::list(["VV", "HH"]);
        assert_eq!(
            translate_param("polarization", &value).unwrap(),
            pairs(&[
                ("attribute[]", "string,POLARIZATION,VV"),
                ("attribute[]", "string,POLARIZATION,HH"),
            ])
        );
        assert!(translate_param("start", &ParamValue::from("2020-01-01"))
            .unwrap()
            .is_empty());
    }
}
