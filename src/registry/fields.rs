use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Time,
}

impl FieldKind {
    /// Postgres cast applied to the bound parameter.
    pub fn cast(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "bigint",
            FieldKind::Decimal => "numeric",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Timestamp => "timestamptz",
            FieldKind::Time => "time",
        }
    }
}

/// One writable column. `default` is a SQL expression used when the value is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<&'static str>,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, default: None }
    }

    pub const fn or(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    /// `$n::cast`, wrapped in COALESCE when there is a default.
    pub fn placeholder(&self, n: usize) -> String {
        match self.default {
            Some(default) => format!("COALESCE(${}::{}, {})", n, self.kind.cast(), default),
            None => format!("${}::{}", n, self.kind.cast()),
        }
    }
}

pub const fn text(name: &'static str) -> Field {
    Field::new(name, FieldKind::Text)
}

pub const fn int(name: &'static str) -> Field {
    Field::new(name, FieldKind::Integer)
}

pub const fn decimal(name: &'static str) -> Field {
    Field::new(name, FieldKind::Decimal)
}

pub const fn flag(name: &'static str, default: bool) -> Field {
    Field::new(name, FieldKind::Boolean).or(if default { "TRUE" } else { "FALSE" })
}

pub const fn date(name: &'static str) -> Field {
    Field::new(name, FieldKind::Date)
}

pub const fn timestamp(name: &'static str) -> Field {
    Field::new(name, FieldKind::Timestamp)
}

pub const fn time(name: &'static str) -> Field {
    Field::new(name, FieldKind::Time)
}

fn blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Truthy coercion for flags: numbers are true when non-zero, strings when they
/// read as a non-zero number or as true/yes/on.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(f) => f != 0.0,
                Err(_) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "on" | "y"),
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Integral and inside the i64 range, so the cast is exact.
fn whole_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Normalize one client value to what the column's cast accepts.
/// Blank input becomes null for every kind except text.
pub fn coerce(kind: FieldKind, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if kind != FieldKind::Text && blank(value) {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("expected text".to_string()),
        },
        FieldKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| whole_i64(*f)).map(|f| f as i64))
                .map(Value::from)
                .ok_or_else(|| "expected an integer".to_string()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "expected an integer".to_string()),
            _ => Err("expected an integer".to_string()),
        },
        FieldKind::Decimal => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(Value::String(s.trim().to_string())),
            _ => Err("expected a number".to_string()),
        },
        FieldKind::Boolean => Ok(Value::Bool(truthy(value))),
        FieldKind::Date => value
            .as_str()
            .and_then(parse_date)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| "expected a date (YYYY-MM-DD)".to_string()),
        FieldKind::Timestamp => value
            .as_str()
            .map(str::trim)
            .filter(|s| parse_timestamp(s))
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| "expected a date-time".to_string()),
        FieldKind::Time => value
            .as_str()
            .map(str::trim)
            .and_then(|s| {
                NaiveTime::parse_from_str(s, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .ok()
            })
            .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
            .ok_or_else(|| "expected a time (HH:MM)".to_string()),
    }
}

/// `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn parse_timestamp(raw: &str) -> bool {
    DateTime::parse_from_rfc3339(raw).is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

pub fn as_object(payload: &Value) -> Result<&Map<String, Value>, ApiError> {
    payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Request body must be a JSON object"))
}

/// Required fields that are absent, null or blank, in declaration order.
pub fn missing<'a>(payload: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| payload.get(*name).map_or(true, blank))
        .collect()
}

pub fn require(payload: &Map<String, Value>, required: &[&str]) -> Result<(), ApiError> {
    let absent = missing(payload, required);
    if absent.is_empty() {
        Ok(())
    } else {
        Err(ApiError::missing_fields(&absent))
    }
}

/// Validate and coerce a full-replace payload: one value per field, in field
/// order; fields the client left out are null.
pub fn prepare(fields: &[Field], required: &[&str], payload: &Value) -> Result<Vec<Value>, ApiError> {
    let object = as_object(payload)?;
    require(object, required)?;

    let mut errors = BTreeMap::new();
    let values: Vec<Value> = fields
        .iter()
        .map(|field| {
            let raw = object.get(field.name).unwrap_or(&Value::Null);
            coerce(field.kind, raw).unwrap_or_else(|reason| {
                errors.insert(field.name.to_string(), reason);
                Value::Null
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(values)
    } else {
        let names: Vec<&str> = errors.keys().map(String::as_str).collect();
        let message = format!("Invalid values for: {}", names.join(", "));
        Err(ApiError::validation_error(message, Some(errors)))
    }
}

/// Coerced value of `name` from a prepared payload.
pub fn value_of<'v>(fields: &[Field], values: &'v [Value], name: &str) -> Option<&'v Value> {
    fields
        .iter()
        .position(|f| f.name == name)
        .and_then(|i| values.get(i))
        .filter(|v| !v.is_null())
}
