//! Declarative field schema driving columns, forms, and dependency gates.
//!
//! A [`Schema`] is an immutable, ordered list of [`FieldDescriptor`]s shared
//! by reference. Every derived structure (column descriptors, form fields)
//! is a fresh value; the schema itself is never mutated after construction.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::types::{display_string, OptionMap, Record, DEFAULT_KEY_NAME};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The closed set of field kinds. Every consumer matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Bool,
    Date,
    Radio,
    Select,
}

/// Places where a field can be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// Edit/create form.
    Form,
    /// Table column.
    Column,
}

// ---------------------------------------------------------------------------
// Remote descriptors
// ---------------------------------------------------------------------------

/// Identifies a remote operation together with its variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    /// Name of the remote operation (query or mutation document name).
    pub operation: String,
    /// Variables sent with the operation.
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub variables: Record,
}

impl QueryDescriptor {
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            variables: Record::new(),
        }
    }

    /// Returns a copy carrying one more variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Returns a copy whose variables are extended by `variables`.
    #[must_use]
    pub fn with_variables(mut self, variables: Record) -> Self {
        self.variables.extend(variables);
        self
    }
}

/// A remote operation plus the accessor path into its response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSource {
    pub query: QueryDescriptor,
    /// Member of the response payload holding the relevant records.
    pub access_data: String,
    /// Identifier property for point lookups and mutations. Defaults to `"id"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

impl RemoteSource {
    #[must_use]
    pub fn new(query: QueryDescriptor, access_data: impl Into<String>) -> Self {
        Self {
            query,
            access_data: access_data.into(),
            key_name: None,
        }
    }

    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    #[must_use]
    pub fn key_name(&self) -> &str {
        self.key_name.as_deref().unwrap_or(DEFAULT_KEY_NAME)
    }

    /// The member of `payload` named by `access_data`, if present.
    #[must_use]
    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        payload.get(&self.access_data)
    }
}

/// Maps one item of an option query response to option entries.
pub type OptionMapper = Arc<dyn Fn(&Value) -> OptionMap + Send + Sync>;

/// Asynchronous option population for a field.
#[derive(Clone)]
pub struct ConfigOptions {
    /// Remote query; `None` means the field keeps its static options.
    pub query: Option<QueryDescriptor>,
    /// Member of the response payload holding the option items.
    pub access_data: String,
    pub map: OptionMapper,
}

impl ConfigOptions {
    pub fn new<F>(query: QueryDescriptor, access_data: impl Into<String>, map: F) -> Self
    where
        F: Fn(&Value) -> OptionMap + Send + Sync + 'static,
    {
        Self {
            query: Some(query),
            access_data: access_data.into(),
            map: Arc::new(map),
        }
    }

    /// Options built from two properties of every item, e.g. `id` and `name`.
    pub fn by_keys(
        query: QueryDescriptor,
        access_data: impl Into<String>,
        value_key: impl Into<String>,
        label_key: impl Into<String>,
    ) -> Self {
        let value_key = value_key.into();
        let label_key = label_key.into();
        Self::new(query, access_data, move |item| {
            let mut entry = OptionMap::new();
            if let Some(value) = item.get(&value_key) {
                let label = item.get(&label_key).map(display_string).unwrap_or_default();
                entry.insert(display_string(value), label);
            }
            entry
        })
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.query.is_some()
    }

    /// Flattens a response payload into one option map, in item order.
    /// A missing or non-array member yields an empty map.
    #[must_use]
    pub fn resolve(&self, payload: &Value) -> OptionMap {
        payload
            .get(&self.access_data)
            .and_then(Value::as_array)
            .map(|items| {
                items.iter().fold(OptionMap::new(), |mut options, item| {
                    options.extend((self.map)(item));
                    options
                })
            })
            .unwrap_or_default()
    }
}

impl fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("query", &self.query)
            .field("access_data", &self.access_data)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Dependencies and patches
// ---------------------------------------------------------------------------

/// Partial update computed by a dependency and merged into a field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldPatch {
    pub title: Option<String>,
    pub hidden: Option<BTreeSet<Context>>,
    pub options: Option<OptionMap>,
    pub required: Option<bool>,
    pub disabled: Option<bool>,
}

impl FieldPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Patch that clears every hidden context, revealing the field.
    #[must_use]
    pub fn reveal() -> Self {
        Self {
            hidden: Some(BTreeSet::new()),
            ..Self::default()
        }
    }

    /// Patch that replaces a field's options.
    #[must_use]
    pub fn options(options: OptionMap) -> Self {
        Self {
            options: Some(options),
            ..Self::default()
        }
    }
}

pub type PatchFn = Arc<dyn Fn() -> FieldPatch + Send + Sync>;

/// Cross-field trigger: once every listed sibling holds a value,
/// `on_change` computes a patch for the declaring field.
#[derive(Clone)]
pub struct Dependencies {
    pub fields: Vec<String>,
    pub on_change: PatchFn,
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Custom display transform: `(stored value, whole record) -> text`.
pub type RenderFn = Arc<dyn Fn(&Value, &Record) -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// One editable/displayable attribute.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub key: String,
    pub title: String,
    pub field_type: FieldType,
    pub sorter: bool,
    pub filter: bool,
    pub required: bool,
    pub disabled: bool,
    pub options: OptionMap,
    pub config_options: Option<ConfigOptions>,
    pub hidden: BTreeSet<Context>,
    pub dependencies: Option<Dependencies>,
    pub render: Option<RenderFn>,
    /// Alternate record property read by option renderers and search filters.
    pub column_key: Option<String>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            title: String::new(),
            field_type,
            sorter: false,
            filter: false,
            required: false,
            disabled: false,
            options: OptionMap::new(),
            config_options: None,
            hidden: BTreeSet::new(),
            dependencies: None,
            render: None,
            column_key: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sorter = true;
        self
    }

    #[must_use]
    pub fn filterable(mut self) -> Self {
        self.filter = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_options<K, V>(mut self, options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_config_options(mut self, config_options: ConfigOptions) -> Self {
        self.config_options = Some(config_options);
        self
    }

    #[must_use]
    pub fn hidden_in(mut self, context: Context) -> Self {
        self.hidden.insert(context);
        self
    }

    #[must_use]
    pub fn with_dependencies<F>(mut self, fields: &[&str], on_change: F) -> Self
    where
        F: Fn() -> FieldPatch + Send + Sync + 'static,
    {
        self.dependencies = Some(Dependencies {
            fields: fields.iter().map(ToString::to_string).collect(),
            on_change: Arc::new(on_change),
        });
        self
    }

    #[must_use]
    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value, &Record) -> String + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    #[must_use]
    pub fn with_column_key(mut self, column_key: impl Into<String>) -> Self {
        self.column_key = Some(column_key.into());
        self
    }

    #[must_use]
    pub fn is_hidden_in(&self, context: Context) -> bool {
        self.hidden.contains(&context)
    }

    /// Whether options come from a remote query rather than the static map.
    #[must_use]
    pub fn has_remote_options(&self) -> bool {
        self.config_options
            .as_ref()
            .is_some_and(ConfigOptions::is_remote)
    }

    /// Record property the column reads: `column_key` when declared.
    #[must_use]
    pub fn data_key(&self) -> &str {
        self.column_key.as_deref().unwrap_or(&self.key)
    }

    /// Returns a copy with `patch` merged in. Unset patch members keep the
    /// current value.
    #[must_use]
    pub fn patched(&self, patch: FieldPatch) -> Self {
        let mut field = self.clone();
        if let Some(title) = patch.title {
            field.title = title;
        }
        if let Some(hidden) = patch.hidden {
            field.hidden = hidden;
        }
        if let Some(options) = patch.options {
            field.options = options;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(disabled) = patch.disabled {
            field.disabled = disabled;
        }
        field
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("field_type", &self.field_type)
            .field("sorter", &self.sorter)
            .field("filter", &self.filter)
            .field("required", &self.required)
            .field("disabled", &self.disabled)
            .field("options", &self.options)
            .field("config_options", &self.config_options)
            .field("hidden", &self.hidden)
            .field("dependencies", &self.dependencies)
            .field("render", &self.render.as_ref().map(|_| "<fn>"))
            .field("column_key", &self.column_key)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Declarative form
// ---------------------------------------------------------------------------

/// JSON form of an option source: options are read from two item properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionSourceSpec {
    query: QueryDescriptor,
    access_data: String,
    #[serde(default = "default_value_key")]
    value_key: String,
    #[serde(default = "default_label_key")]
    label_key: String,
}

fn default_value_key() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_label_key() -> String {
    "name".to_string()
}

/// JSON form of a field descriptor. Closures are attached in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldSpec {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    sorter: bool,
    #[serde(default)]
    filter: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    options: OptionMap,
    #[serde(default)]
    config_options: Option<OptionSourceSpec>,
    #[serde(default)]
    hidden: BTreeSet<Context>,
    #[serde(default)]
    column_key: Option<String>,
}

impl From<FieldSpec> for FieldDescriptor {
    fn from(spec: FieldSpec) -> Self {
        let mut field = FieldDescriptor::new(spec.key, spec.field_type).with_title(spec.title);
        field.sorter = spec.sorter;
        field.filter = spec.filter;
        field.required = spec.required;
        field.disabled = spec.disabled;
        field.options = spec.options;
        field.hidden = spec.hidden;
        field.column_key = spec.column_key;
        field.config_options = spec.config_options.map(|source| {
            ConfigOptions::by_keys(
                source.query,
                source.access_data,
                source.value_key,
                source.label_key,
            )
        });
        field
    }
}

/// Parses a JSON array of field descriptors.
///
/// # Errors
///
/// Returns `SchemaError::Json` when the document does not match the
/// descriptor shape.
pub fn parse_fields(json: &str) -> Result<Vec<FieldDescriptor>, SchemaError> {
    let specs: Vec<FieldSpec> = serde_json::from_str(json)?;
    Ok(specs.into_iter().map(FieldDescriptor::from).collect())
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered, validated, shared list of field descriptors.
///
/// Cloning is cheap and preserves identity: clones compare equal under
/// [`Schema::ptr_eq`], which is what column memoization keys on.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Arc<[FieldDescriptor]>,
}

impl Schema {
    /// Validates and freezes a field list.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate keys, on dependency blocks with no
    /// prerequisites, and on prerequisites naming unknown fields.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut keys = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !keys.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateKey {
                    key: field.key.clone(),
                });
            }
        }
        for field in &fields {
            let Some(deps) = &field.dependencies else {
                continue;
            };
            if deps.fields.is_empty() {
                return Err(SchemaError::EmptyDependencies {
                    key: field.key.clone(),
                });
            }
            if let Some(unknown) = deps.fields.iter().find(|d| !keys.contains(d.as_str())) {
                return Err(SchemaError::UnknownDependency {
                    key: field.key.clone(),
                    dependency: unknown.clone(),
                });
            }
        }
        Ok(Self {
            fields: fields.into(),
        })
    }

    /// Parses and validates a JSON array of field descriptors.
    ///
    /// # Errors
    ///
    /// Propagates parse errors and the validation errors of [`Schema::new`].
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Self::new(parse_fields(json)?)
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields that are not hidden for `context`, in schema order.
    pub fn visible_in(&self, context: Context) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |f| !f.is_hidden_in(context))
    }

    /// Identity comparison: true only for clones of the same schema.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}
