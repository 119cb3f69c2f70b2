//! Coercion of result cells into the declared types of record fields.
//!
//! The set of supported conversions is closed: every `(RowValues variant, target)`
//! pairing either has a defined rule below or fails with a [`CoercionError`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::error::DbUtilsError;
use crate::types::RowValues;

/// The effective storage type of a field, after unwrapping `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    Text,
    Timestamp,
    Date,
    TimestampTz,
    Json,
    Bytes,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::SmallInt => "i16",
            TargetKind::Integer => "i32",
            TargetKind::BigInt => "i64",
            TargetKind::Real => "f32",
            TargetKind::Double => "f64",
            TargetKind::Boolean => "bool",
            TargetKind::Text => "String",
            TargetKind::Timestamp => "NaiveDateTime",
            TargetKind::Date => "NaiveDate",
            TargetKind::TimestampTz => "DateTime<Utc>",
            TargetKind::Json => "serde_json::Value",
            TargetKind::Bytes => "Vec<u8>",
        };
        f.write_str(name)
    }
}

/// A single failed conversion, before it is tied to a row and column.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {from} to {to}: {message}")]
pub struct CoercionError {
    pub from: &'static str,
    pub to: TargetKind,
    pub message: String,
}

impl CoercionError {
    fn new(value: &RowValues, to: TargetKind, message: impl Into<String>) -> Self {
        Self {
            from: value.kind_name(),
            to,
            message: message.into(),
        }
    }

    fn unsupported(value: &RowValues, to: TargetKind) -> Self {
        Self::new(value, to, "unsupported conversion")
    }

    /// Attach the row and column the failing cell came from.
    #[must_use]
    pub fn at(self, row: usize, column: &str) -> DbUtilsError {
        DbUtilsError::Conversion {
            row,
            column: column.to_string(),
            from: self.from,
            to: self.to,
            message: self.message,
        }
    }
}

/// Types a result cell can be coerced into.
///
/// `Option<T>` is the nullable wrapper: it reports the same [`TargetKind`] as `T`
/// and turns `Null` into `None`. Every other implementor rejects `Null`.
pub trait FromRowValue: Sized {
    /// Effective storage type used for coercion.
    const KIND: TargetKind;
    /// Whether the declared type is a nullable wrapper.
    const NULLABLE: bool = false;

    /// Coerce a cell value into `Self`.
    ///
    /// # Errors
    /// Returns `CoercionError` when the pairing is unsupported or the value does not fit.
    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError>;
}

/// Coerce a value into `T`.
///
/// # Errors
/// See [`FromRowValue::from_row_value`].
pub fn coerce<T: FromRowValue>(value: &RowValues) -> Result<T, CoercionError> {
    T::from_row_value(value)
}

fn null_error(to: TargetKind) -> CoercionError {
    CoercionError {
        from: "null",
        to,
        message: "null value for a non-nullable target".to_string(),
    }
}

// i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;

fn to_i64(value: &RowValues, to: TargetKind) -> Result<i64, CoercionError> {
    match value {
        RowValues::Int(i) => Ok(*i),
        RowValues::Float(f) => {
            let rounded = f.round_ties_even();
            if !rounded.is_finite() || rounded < I64_LOWER || rounded >= I64_UPPER {
                return Err(CoercionError::new(value, to, format!("{f} is out of range")));
            }
            #[allow(clippy::cast_possible_truncation)]
            let whole = rounded as i64;
            Ok(whole)
        }
        RowValues::Bool(b) => Ok(i64::from(*b)),
        RowValues::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| CoercionError::new(value, to, format!("'{s}': {e}"))),
        RowValues::Null => Err(null_error(to)),
        _ => Err(CoercionError::unsupported(value, to)),
    }
}

macro_rules! impl_narrow_int {
    ($ty:ty, $kind:expr) => {
        impl FromRowValue for $ty {
            const KIND: TargetKind = $kind;

            fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
                let wide = to_i64(value, Self::KIND)?;
                <$ty>::try_from(wide).map_err(|_| {
                    CoercionError::new(value, Self::KIND, format!("{wide} is out of range"))
                })
            }
        }
    };
}

impl_narrow_int!(i16, TargetKind::SmallInt);
impl_narrow_int!(i32, TargetKind::Integer);

impl FromRowValue for i64 {
    const KIND: TargetKind = TargetKind::BigInt;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        to_i64(value, Self::KIND)
    }
}

fn to_f64(value: &RowValues, to: TargetKind) -> Result<f64, CoercionError> {
    match value {
        #[allow(clippy::cast_precision_loss)]
        RowValues::Int(i) => Ok(*i as f64),
        RowValues::Float(f) => Ok(*f),
        RowValues::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        RowValues::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| CoercionError::new(value, to, format!("'{s}': {e}"))),
        RowValues::Null => Err(null_error(to)),
        _ => Err(CoercionError::unsupported(value, to)),
    }
}

impl FromRowValue for f64 {
    const KIND: TargetKind = TargetKind::Double;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        to_f64(value, Self::KIND)
    }
}

impl FromRowValue for f32 {
    const KIND: TargetKind = TargetKind::Real;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        let wide = to_f64(value, Self::KIND)?;
        #[allow(clippy::cast_possible_truncation)]
        let narrow = wide as f32;
        if wide.is_finite() && !narrow.is_finite() {
            return Err(CoercionError::new(
                value,
                Self::KIND,
                format!("{wide} is out of range"),
            ));
        }
        Ok(narrow)
    }
}

impl FromRowValue for bool {
    const KIND: TargetKind = TargetKind::Boolean;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Bool(b) => Ok(*b),
            RowValues::Int(i) => Ok(*i != 0),
            RowValues::Float(f) => Ok(*f != 0.0),
            RowValues::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Ok(true),
                "false" | "f" | "0" | "no" => Ok(false),
                _ => Err(CoercionError::new(
                    value,
                    Self::KIND,
                    format!("'{s}' is not a boolean"),
                )),
            },
            RowValues::Null => Err(null_error(Self::KIND)),
            _ => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl FromRowValue for String {
    const KIND: TargetKind = TargetKind::Text;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Text(s) => Ok(s.clone()),
            RowValues::Int(i) => Ok(i.to_string()),
            RowValues::Float(f) => Ok(f.to_string()),
            RowValues::Bool(b) => Ok(b.to_string()),
            RowValues::Timestamp(dt) => Ok(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            RowValues::JSON(json) => Ok(json.to_string()),
            RowValues::Null => Err(null_error(Self::KIND)),
            RowValues::Blob(_) => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse text carrying an explicit UTC offset (RFC 3339 or Postgres `timestamptz` output).
fn parse_offset_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Some(dt) = parse_offset_datetime(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl FromRowValue for NaiveDateTime {
    const KIND: TargetKind = TargetKind::Timestamp;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Timestamp(dt) => Ok(*dt),
            RowValues::Text(s) => parse_naive_datetime(s).ok_or_else(|| {
                CoercionError::new(value, Self::KIND, format!("'{s}' is not a timestamp"))
            }),
            RowValues::Null => Err(null_error(Self::KIND)),
            _ => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl FromRowValue for NaiveDate {
    const KIND: TargetKind = TargetKind::Date;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Timestamp(dt) => Ok(dt.date()),
            RowValues::Text(s) => parse_naive_datetime(s)
                .map(|dt| dt.date())
                .ok_or_else(|| {
                    CoercionError::new(value, Self::KIND, format!("'{s}' is not a date"))
                }),
            RowValues::Null => Err(null_error(Self::KIND)),
            _ => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl FromRowValue for DateTime<Utc> {
    const KIND: TargetKind = TargetKind::TimestampTz;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Timestamp(dt) => Ok(Utc.from_utc_datetime(dt)),
            RowValues::Text(s) => parse_offset_datetime(s.trim())
                .or_else(|| parse_naive_datetime(s).map(|dt| Utc.from_utc_datetime(&dt)))
                .ok_or_else(|| {
                    CoercionError::new(value, Self::KIND, format!("'{s}' is not a timestamp"))
                }),
            RowValues::Null => Err(null_error(Self::KIND)),
            _ => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl FromRowValue for JsonValue {
    const KIND: TargetKind = TargetKind::Json;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::JSON(json) => Ok(json.clone()),
            RowValues::Text(s) => serde_json::from_str(s)
                .map_err(|e| CoercionError::new(value, Self::KIND, e.to_string())),
            RowValues::Int(i) => Ok(JsonValue::from(*i)),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .ok_or_else(|| CoercionError::new(value, Self::KIND, "non-finite number")),
            RowValues::Bool(b) => Ok(JsonValue::Bool(*b)),
            RowValues::Timestamp(dt) => Ok(JsonValue::String(
                dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            )),
            RowValues::Null => Err(null_error(Self::KIND)),
            RowValues::Blob(_) => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl FromRowValue for Vec<u8> {
    const KIND: TargetKind = TargetKind::Bytes;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        match value {
            RowValues::Blob(bytes) => Ok(bytes.clone()),
            RowValues::Text(s) => Ok(s.as_bytes().to_vec()),
            RowValues::Null => Err(null_error(Self::KIND)),
            _ => Err(CoercionError::unsupported(value, Self::KIND)),
        }
    }
}

impl<T: FromRowValue> FromRowValue for Option<T> {
    const KIND: TargetKind = T::KIND;
    const NULLABLE: bool = true;

    fn from_row_value(value: &RowValues) -> Result<Self, CoercionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_row_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RowValues {
        RowValues::Text(s.to_string())
    }

    #[test]
    fn integers_from_text_and_float() {
        assert_eq!(coerce::<i32>(&text(" 42 ")), Ok(42));
        assert_eq!(coerce::<i64>(&RowValues::Float(2.5)), Ok(2));
        assert_eq!(coerce::<i64>(&RowValues::Float(3.5)), Ok(4));
        assert_eq!(coerce::<i16>(&RowValues::Bool(true)), Ok(1));
    }

    #[test]
    fn integer_range_is_checked() {
        let err = coerce::<i16>(&RowValues::Int(70_000)).unwrap_err();
        assert_eq!(err.to, TargetKind::SmallInt);
        assert_eq!(err.from, "int");
        assert!(coerce::<i64>(&RowValues::Float(f64::NAN)).is_err());
        assert!(coerce::<i64>(&RowValues::Float(1e19)).is_err());
        assert!(coerce::<i32>(&text("abc")).is_err());
    }

    #[test]
    fn booleans() {
        assert_eq!(coerce::<bool>(&text("True")), Ok(true));
        assert_eq!(coerce::<bool>(&text("f")), Ok(false));
        assert_eq!(coerce::<bool>(&RowValues::Int(2)), Ok(true));
        assert!(coerce::<bool>(&text("maybe")).is_err());
    }

    #[test]
    fn strings_from_scalars() {
        assert_eq!(coerce::<String>(&RowValues::Int(7)), Ok("7".to_string()));
        assert_eq!(coerce::<String>(&RowValues::Bool(false)), Ok("false".to_string()));
        assert!(coerce::<String>(&RowValues::Blob(vec![1])).is_err());
    }

    #[test]
    fn timestamps_from_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(13, 45, 0))
            .unwrap();
        assert_eq!(
            coerce::<NaiveDateTime>(&text("2024-03-09 13:45:00")),
            Ok(expected)
        );
        assert_eq!(
            coerce::<NaiveDateTime>(&text("2024-03-09T13:45:00")),
            Ok(expected)
        );
        assert_eq!(
            coerce::<NaiveDateTime>(&text("2024-03-09 15:45:00+02")),
            Ok(expected)
        );
        assert_eq!(
            coerce::<DateTime<Utc>>(&text("2024-03-09T13:45:00Z")),
            Ok(Utc.from_utc_datetime(&expected))
        );
        assert_eq!(
            coerce::<NaiveDate>(&text("2024-03-09")),
            Ok(expected.date())
        );
        assert!(coerce::<NaiveDateTime>(&RowValues::Int(5)).is_err());
    }

    #[test]
    fn json_from_text() {
        let v = coerce::<JsonValue>(&text(r#"{"a":1}"#)).unwrap();
        assert_eq!(v["a"], JsonValue::from(1));
        assert!(coerce::<JsonValue>(&text("{")).is_err());
    }

    #[test]
    fn option_unwraps_to_inner_kind() {
        assert_eq!(<Option<bool> as FromRowValue>::KIND, TargetKind::Boolean);
        assert!(<Option<bool> as FromRowValue>::NULLABLE);
        assert!(!<bool as FromRowValue>::NULLABLE);
        assert_eq!(coerce::<Option<bool>>(&RowValues::Null), Ok(None));
        assert_eq!(coerce::<Option<bool>>(&text("true")), Ok(Some(true)));
        assert!(coerce::<bool>(&RowValues::Null).is_err());
    }
}
