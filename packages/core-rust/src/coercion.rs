//! Conversion between stored values and typed edit values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::schema::{FieldDescriptor, FieldType};
use crate::types::{display_string, RawValue};

/// Typed value held by a form control.
#[derive(Debug, Clone, PartialEq)]
pub enum EditValue {
    /// No value present.
    Empty,
    Text(String),
    Date(DateTime<Utc>),
    /// Number, radio and bool values keep their stored form.
    Raw(Value),
}

impl EditValue {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Converts a stored value into the edit value for `field`.
///
/// References are reduced to their identifier first. Objects without an
/// identifier are stringified like any other value. Never panics on `null`:
/// text fields get an empty string, passthrough fields keep `null`.
#[must_use]
pub fn to_edit_value(raw: &Value, field: &FieldDescriptor) -> EditValue {
    let value = RawValue::classify(raw).resolved();
    match field.field_type {
        FieldType::Date => match parse_date(value) {
            Some(date) => EditValue::Date(date),
            None if value.is_null() => EditValue::Empty,
            None => {
                debug!(field = %field.key, value = %value, "unparseable date kept as text");
                EditValue::Text(display_string(value))
            }
        },
        FieldType::Number | FieldType::Radio | FieldType::Bool => EditValue::Raw(value.clone()),
        FieldType::String | FieldType::Select => EditValue::Text(display_string(value)),
    }
}

/// Converts an edit value back into its stored JSON form.
#[must_use]
pub fn to_raw(value: &EditValue) -> Value {
    match value {
        EditValue::Empty => Value::Null,
        EditValue::Text(text) => Value::String(text.clone()),
        EditValue::Date(date) => Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        EditValue::Raw(raw) => raw.clone(),
    }
}

/// Parses RFC 3339 timestamps, naive datetimes, plain `YYYY-MM-DD` dates
/// (midnight UTC), and integral epoch milliseconds.
#[must_use]
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_date_str(text.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
