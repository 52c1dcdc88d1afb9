//! Path extraction over loosely-typed catalog records
//!
//! Catalog metadata is deeply nested and inconsistently populated. A path is a
//! sequence of steps applied in order, each narrowing the current value:
//!
//! ```text
//! {
//!   "item1": "foo",                 // [Field("item1")]
//!   "item3": [                      // [Field("item3")]
//!     { "name": "somefield1",       // [Field("item3"), Match("name", "somefield1")]
//!       "value": "a" },             // [Field("item3"), Index(0), Field("value")]
//!     { "name": "somefield2",
//!       "value": ["x", "y", "z"] }  // [Field("item3"), Match("name", "somefield2"), Field("value"), Index(1)]
//!   ]
//! }
//! ```
//!
//! A missing key, an out-of-range index or a selector with no matching child
//! ends the walk with `None`. The final value is also reported as `None` when
//! it is one of the "no data" sentinels (`null`, `""`, `"NA"`, `"N/A"`).

use serde_json::Value;

/// Strings the catalog uses to mean "no value".
const NULL_SENTINELS: [&str; 3] = ["", "NA", "N/A"];

/// One step of an extraction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep<'a> {
    /// Look up a key in the current object.
    Field(&'a str),
    /// Index into the current array.
    Index(usize),
    /// Select the first array element whose `field` equals `value`. Scalars
    /// compare by their text form, so `5` and `true` match `"5"` and `"true"`.
    Match(&'a str, &'a str),
}

/// Lenient coercion applied to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    /// Keep strings as-is, render numbers and booleans as text.
    Text,
    /// Integer; numeric strings are parsed, floats truncated.
    Int,
    /// Floating point; numeric strings are parsed.
    Float,
}

impl Cast {
    /// Coerce `value`, returning `None` instead of failing on malformed data.
    pub fn apply(self, value: &Value) -> Option<Value> {
        match self {
            Self::Text => as_text(value).map(Value::String),
            Self::Int => as_int(value).map(Value::from),
            Self::Float => as_float(value)
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        }
    }
}

/// Walk `root` along `path`.
pub fn extract<'v>(root: &'v Value, path: &[PathStep<'_>]) -> Option<&'v Value> {
    let mut current = root;
    for step in path {
        current = match *step {
            PathStep::Field(name) => current.as_object()?.get(name)?,
            PathStep::Index(index) => current.as_array()?.get(index)?,
            PathStep::Match(field, expected) => current.as_array()?.iter().find(|child| {
                extract_with(child, &[PathStep::Field(field)], as_text).as_deref()
                    == Some(expected)
            })?,
        };
        if current.is_null() {
            return None;
        }
    }

    if is_sentinel(current) {
        None
    } else {
        Some(current)
    }
}

/// Walk `root` along `path` and pass the result through `cast`.
///
/// A cast that cannot handle the value yields `None`.
pub fn extract_with<T>(
    root: &Value,
    path: &[PathStep<'_>],
    cast: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    extract(root, path).and_then(cast)
}

/// Whether `value` is one of the "no data" sentinels.
pub fn is_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => NULL_SENTINELS.contains(&s.as_str()),
        _ => false,
    }
}

pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
