//! Form session data: the per-field state a form controller commits.

use std::fmt;

use serde_json::Value;

use crate::coercion::{to_edit_value, to_raw, EditValue};
use crate::schema::{Context, FieldDescriptor, FieldPatch, Schema};
use crate::types::{Record, RecordKey};

/// Whether a session creates a new record or updates an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Update(RecordKey),
}

impl FormMode {
    /// Absent or falsy keys select create mode.
    #[must_use]
    pub fn from_key(key: Option<RecordKey>) -> Self {
        match key {
            Some(key) if key.is_truthy() => Self::Update(key),
            _ => Self::Create,
        }
    }

    #[must_use]
    pub fn key(&self) -> Option<&RecordKey> {
        match self {
            Self::Create => None,
            Self::Update(key) => Some(key),
        }
    }
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update(key) => write!(f, "update({key})"),
        }
    }
}

/// A schema field as materialized in a form: patched descriptor plus live value.
#[derive(Debug, Clone)]
pub struct FormField {
    pub field: FieldDescriptor,
    pub value: EditValue,
}

impl FormField {
    #[must_use]
    pub fn new(field: FieldDescriptor) -> Self {
        Self {
            field,
            value: EditValue::Empty,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.field.key
    }

    /// Merges a dependency patch into this field's descriptor.
    pub fn apply(&mut self, patch: FieldPatch) {
        self.field = self.field.patched(patch);
    }

    /// Replaces the live value with the coerced form of `raw`; `None`
    /// clears it.
    pub fn set_raw(&mut self, raw: Option<&Value>) {
        self.value = raw.map_or(EditValue::Empty, |raw| to_edit_value(raw, &self.field));
    }
}

/// Initial field list of a session: schema fields not hidden for forms.
#[must_use]
pub fn form_fields(schema: &Schema) -> Vec<FormField> {
    schema
        .visible_in(Context::Form)
        .cloned()
        .map(FormField::new)
        .collect()
}

/// Current values of `fields` in stored form, skipping empty ones.
#[must_use]
pub fn values_of(fields: &[FormField]) -> Record {
    fields
        .iter()
        .filter(|f| !f.value.is_empty())
        .map(|f| (f.field.key.clone(), to_raw(&f.value)))
        .collect()
}
