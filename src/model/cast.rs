//! Attribute casting
//!
//! Attributes are stored in SQLite storage form ([`Value`]). A model declares
//! per-attribute [`CastType`]s; reads convert storage form into an
//! [`AttributeValue`] of that kind and writes convert back. Conversion happens
//! only at these two boundaries.

use crate::database::Value;
use crate::error::{DataError, DataResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value as JsonValue;

/// How an attribute is interpreted on read and normalized on write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Boolean,
    Integer,
    Float,
    String,
    /// ISO-8601 text in storage, `DateTime<Utc>` on read
    DateTime,
    /// JSON text in storage, `serde_json::Value` on read
    Json,
}

impl CastType {
    pub fn name(&self) -> &'static str {
        match self {
            CastType::Boolean => "boolean",
            CastType::Integer => "integer",
            CastType::Float => "float",
            CastType::String => "string",
            CastType::DateTime => "datetime",
            CastType::Json => "json",
        }
    }
}

/// A typed attribute value as seen by application code
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            AttributeValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            AttributeValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// External (JSON) representation; datetimes become RFC 3339 strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            AttributeValue::Null => JsonValue::Null,
            AttributeValue::Bool(b) => JsonValue::Bool(*b),
            AttributeValue::Integer(i) => JsonValue::from(*i),
            AttributeValue::Float(f) => JsonValue::from(*f),
            AttributeValue::Text(s) => JsonValue::from(s.as_str()),
            AttributeValue::Blob(b) => JsonValue::from(b.clone()),
            AttributeValue::DateTime(dt) => JsonValue::from(format_datetime(dt)),
            AttributeValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Payload values from JSON documents, e.g. remote API responses
impl From<JsonValue> for AttributeValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => AttributeValue::Null,
            JsonValue::Bool(b) => AttributeValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Float)
                    .unwrap_or(AttributeValue::Null),
            },
            JsonValue::String(s) => AttributeValue::Text(s),
            other => AttributeValue::Json(other),
        }
    }
}

/// Storage values read without a declared cast keep their storage class
impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => AttributeValue::Null,
            Value::Integer(i) => AttributeValue::Integer(i),
            Value::Real(f) => AttributeValue::Float(f),
            Value::Text(s) => AttributeValue::Text(s),
            Value::Blob(b) => AttributeValue::Blob(b),
        }
    }
}

/// ISO-8601 text used for datetimes in storage
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) or a bare date
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn cast_error(attribute: &str, cast: CastType, reason: impl Into<String>) -> DataError {
    DataError::Cast {
        attribute: attribute.to_string(),
        target: cast.name(),
        reason: reason.into(),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Storage form to typed value (read direction)
pub fn cast_from_storage(
    attribute: &str,
    value: &Value,
    cast: Option<CastType>,
) -> DataResult<AttributeValue> {
    let Some(cast) = cast else {
        return Ok(AttributeValue::from(value.clone()));
    };
    if value.is_null() {
        return Ok(AttributeValue::Null);
    }

    let unexpected = || cast_error(attribute, cast, format!("unexpected value {}", value));
    match cast {
        CastType::Boolean => match value {
            Value::Integer(i) => Ok(AttributeValue::Bool(*i != 0)),
            Value::Real(f) => Ok(AttributeValue::Bool(*f != 0.0)),
            Value::Text(s) => parse_bool(s).map(AttributeValue::Bool).ok_or_else(unexpected),
            _ => Err(unexpected()),
        },
        CastType::Integer => value
            .as_i64()
            .map(AttributeValue::Integer)
            .ok_or_else(unexpected),
        CastType::Float => value
            .as_f64()
            .map(AttributeValue::Float)
            .ok_or_else(unexpected),
        CastType::String => match value {
            Value::Blob(_) => Err(unexpected()),
            other => Ok(AttributeValue::Text(other.to_string())),
        },
        CastType::DateTime => match value {
            Value::Text(s) => parse_datetime(s)
                .map(AttributeValue::DateTime)
                .ok_or_else(unexpected),
            Value::Integer(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .map(AttributeValue::DateTime)
                .ok_or_else(unexpected),
            _ => Err(unexpected()),
        },
        CastType::Json => match value {
            Value::Text(s) => serde_json::from_str(s)
                .map(AttributeValue::Json)
                .map_err(|e| cast_error(attribute, cast, e.to_string())),
            other => Ok(AttributeValue::Json(other.to_json())),
        },
    }
}

/// Typed value to storage form (write direction)
pub fn cast_to_storage(
    attribute: &str,
    value: AttributeValue,
    cast: Option<CastType>,
) -> DataResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let Some(cast) = cast else {
        return Ok(raw_storage(value));
    };

    let mismatch = |value: &AttributeValue| {
        cast_error(attribute, cast, format!("cannot store {:?}", value))
    };
    match cast {
        CastType::Boolean => match &value {
            AttributeValue::Bool(b) => Ok(Value::from(*b)),
            AttributeValue::Integer(i) => Ok(Value::from(*i != 0)),
            AttributeValue::Text(s) => parse_bool(s).map(Value::from).ok_or_else(|| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        CastType::Integer => match &value {
            AttributeValue::Integer(i) => Ok(Value::Integer(*i)),
            AttributeValue::Bool(b) => Ok(Value::from(*b)),
            AttributeValue::Float(f) if f.fract() == 0.0 => Ok(Value::Integer(*f as i64)),
            AttributeValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        CastType::Float => match &value {
            AttributeValue::Float(f) => Ok(Value::Real(*f)),
            AttributeValue::Integer(i) => Ok(Value::Real(*i as f64)),
            AttributeValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        CastType::String => match &value {
            AttributeValue::Text(s) => Ok(Value::Text(s.clone())),
            AttributeValue::Bool(b) => Ok(Value::Text(b.to_string())),
            AttributeValue::Integer(i) => Ok(Value::Text(i.to_string())),
            AttributeValue::Float(f) => Ok(Value::Text(f.to_string())),
            AttributeValue::DateTime(dt) => Ok(Value::Text(format_datetime(dt))),
            _ => Err(mismatch(&value)),
        },
        CastType::DateTime => match &value {
            AttributeValue::DateTime(dt) => Ok(Value::Text(format_datetime(dt))),
            AttributeValue::Text(s) => parse_datetime(s)
                .map(|dt| Value::Text(format_datetime(&dt)))
                .ok_or_else(|| mismatch(&value)),
            AttributeValue::Integer(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .map(|dt| Value::Text(format_datetime(&dt)))
                .ok_or_else(|| mismatch(&value)),
            _ => Err(mismatch(&value)),
        },
        CastType::Json => match value {
            AttributeValue::Text(s) => serde_json::from_str::<JsonValue>(&s)
                .map(|_| Value::Text(s))
                .map_err(|e| cast_error(attribute, cast, e.to_string())),
            other => Ok(Value::Text(other.to_json().to_string())),
        },
    }
}

fn raw_storage(value: AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::from(b),
        AttributeValue::Integer(i) => Value::Integer(i),
        AttributeValue::Float(f) => Value::Real(f),
        AttributeValue::Text(s) => Value::Text(s),
        AttributeValue::Blob(b) => Value::Blob(b),
        AttributeValue::DateTime(dt) => Value::Text(format_datetime(&dt)),
        AttributeValue::Json(v) => Value::Text(v.to_string()),
    }
}
