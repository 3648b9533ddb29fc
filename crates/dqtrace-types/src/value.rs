use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw spellings that a loader treats as a missing value (the pandas
/// `read_csv` default NA set).
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// `2^63` as a float: the first value above every `i64`.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// A single dynamically typed cell.
///
/// Source data arrives as untyped text, so each cell carries its own type tag
/// rather than the column declaring one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl CellValue {
    /// Infer a typed value from raw text: null markers, then integer, then
    /// float, falling back to text. Overflowing floats such as `1e999` stay
    /// text so the raw value survives serialization.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NULL_MARKERS.contains(&trimmed) {
            return CellValue::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }
        // `f64::from_str` also accepts "inf" and "infinity"; require a digit.
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return CellValue::Float(f);
                }
            }
        }
        CellValue::Text(trimmed.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CellValue::Integer(_))
    }

    /// Numeric view of the cell. Text and null have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Text(_) | CellValue::Null => None,
        }
    }

    /// Compare the cell against a numeric bound. Integers are compared exactly,
    /// without rounding through `f64`. Text, null and NaN bounds give `None`.
    pub fn cmp_f64(&self, bound: f64) -> Option<Ordering> {
        match self {
            CellValue::Integer(i) => cmp_i64_f64(*i, bound),
            CellValue::Float(f) => f.partial_cmp(&bound),
            CellValue::Text(_) | CellValue::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the cell's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::Text(_) => "text",
            CellValue::Null => "null",
        }
    }
}

fn cmp_i64_f64(i: i64, bound: f64) -> Option<Ordering> {
    if bound.is_nan() {
        return None;
    }
    if bound >= I64_UPPER {
        return Some(Ordering::Less);
    }
    if bound < -I64_UPPER {
        return Some(Ordering::Greater);
    }
    let floor = bound.floor();
    // `floor` is integral and within i64 range here, so the cast is exact.
    match i.cmp(&(floor as i64)) {
        Ordering::Equal if bound > floor => Some(Ordering::Less),
        other => Some(other),
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Integer(v.into())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}
