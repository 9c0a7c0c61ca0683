//! Required-value and type-format checks for submitted form values.
//!
//! This is a binding layer, not a rules engine: nothing beyond presence and
//! shape is checked here.

use std::fmt;

use serde_json::Value;

use crate::coercion::parse_date;
use crate::schema::{Context, FieldType};
use crate::session::FormField;
use crate::types::{as_number, display_string, Record};

/// Why one field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// A required field is absent, `null`, or an empty string.
    Required,
    /// A number field holds something that is not numeric.
    InvalidNumber,
    /// A bool field holds something that is not a boolean.
    InvalidBool,
    /// A date field holds something that does not parse as a date.
    InvalidDate,
    /// A radio/select field holds a value outside its options.
    UnknownOption(String),
}

/// A validation failure attached to a field key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub key: String,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Required => write!(f, "'{}' is required", self.key),
            FieldErrorKind::InvalidNumber => write!(f, "'{}' must be a number", self.key),
            FieldErrorKind::InvalidBool => write!(f, "'{}' must be true or false", self.key),
            FieldErrorKind::InvalidDate => write!(f, "'{}' must be a date", self.key),
            FieldErrorKind::UnknownOption(value) => {
                write!(f, "'{}' has no option '{value}'", self.key)
            }
        }
    }
}

/// Result of validating submitted values against the session fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The values conform.
    Valid,
    /// One or more fields failed, in field order.
    Invalid { errors: Vec<FieldError> },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Checks `values` against the visible fields of a form session.
#[must_use]
pub fn validate(fields: &[FormField], values: &Record) -> ValidationResult {
    let errors: Vec<FieldError> = fields
        .iter()
        .filter(|f| !f.field.is_hidden_in(Context::Form))
        .filter_map(|f| {
            check_field(f, values.get(&f.field.key)).map(|kind| FieldError {
                key: f.field.key.clone(),
                kind,
            })
        })
        .collect();
    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid { errors }
    }
}

fn check_field(form_field: &FormField, value: Option<&Value>) -> Option<FieldErrorKind> {
    let field = &form_field.field;
    let value = match value {
        None | Some(Value::Null) => {
            return field.required.then_some(FieldErrorKind::Required);
        }
        Some(Value::String(s)) if s.is_empty() => {
            return field.required.then_some(FieldErrorKind::Required);
        }
        Some(value) => value,
    };
    match field.field_type {
        FieldType::String => None,
        FieldType::Number => as_number(value)
            .is_none()
            .then_some(FieldErrorKind::InvalidNumber),
        FieldType::Bool => (!value.is_boolean()).then_some(FieldErrorKind::InvalidBool),
        FieldType::Date => parse_date(value)
            .is_none()
            .then_some(FieldErrorKind::InvalidDate),
        FieldType::Radio | FieldType::Select => {
            let text = display_string(value);
            (!field.options.is_empty() && !field.options.contains_key(&text))
                .then_some(FieldErrorKind::UnknownOption(text))
        }
    }
}
