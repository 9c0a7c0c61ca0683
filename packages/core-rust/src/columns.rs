//! Projection of a field schema into table column descriptors.
//!
//! Every column carries its comparator, filter bundle, and renderer as plain
//! data; the rendering collaborator only has to call them. Projection is pure
//! and [`ColumnProjector`] memoizes it by schema identity.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::schema::{Context, FieldDescriptor, FieldType, RenderFn, Schema};
use crate::types::{as_number, display_string, is_truthy, OptionMap, Record};

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Comparison strategy picked from the field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    /// Numeric comparison; non-numeric values sort as `0`.
    Number,
    /// `false` before `true`, by truthiness.
    Bool,
    /// Lexicographic comparison of the display string.
    String,
}

impl SortKind {
    #[must_use]
    pub fn for_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Number => Self::Number,
            FieldType::Bool => Self::Bool,
            FieldType::String
            | FieldType::Date
            | FieldType::Radio
            | FieldType::Select => Self::String,
        }
    }
}

/// A comparator bound to one record property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub kind: SortKind,
    pub key: String,
}

impl Comparator {
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let left = a.get(&self.key).unwrap_or(&Value::Null);
        let right = b.get(&self.key).unwrap_or(&Value::Null);
        match self.kind {
            SortKind::Number => {
                let l = as_number(left).unwrap_or(0.0);
                let r = as_number(right).unwrap_or(0.0);
                l.partial_cmp(&r).unwrap_or(Ordering::Equal)
            }
            SortKind::Bool => is_truthy(left).cmp(&is_truthy(right)),
            SortKind::String => display_string(left).cmp(&display_string(right)),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// How a cell turns a stored value into display text.
#[derive(Clone)]
pub enum Renderer {
    /// Explicit transform supplied by the schema.
    Custom(RenderFn),
    /// Label lookup in the field options, or the `column_key` property of
    /// the record when one is declared.
    OptionLabel {
        options: OptionMap,
        column_key: Option<String>,
    },
    /// One of two labels chosen by the truthiness of `record[key]`.
    BoolLabel {
        key: String,
        truthy: String,
        falsy: String,
    },
    /// Display string of the stored value.
    Plain,
}

impl Renderer {
    #[must_use]
    pub fn render(&self, value: &Value, record: &Record) -> String {
        match self {
            Self::Custom(render) => render(value, record),
            Self::OptionLabel {
                column_key: Some(column_key),
                ..
            } => record.get(column_key).map(display_string).unwrap_or_default(),
            Self::OptionLabel {
                options,
                column_key: None,
            } => options
                .get(&display_string(value))
                .cloned()
                .unwrap_or_default(),
            Self::BoolLabel { key, truthy, falsy } => {
                if record.get(key).is_some_and(is_truthy) {
                    truthy.clone()
                } else {
                    falsy.clone()
                }
            }
            Self::Plain => display_string(value),
        }
    }
}

impl PartialEq for Renderer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            (
                Self::OptionLabel {
                    options: a,
                    column_key: ak,
                },
                Self::OptionLabel {
                    options: b,
                    column_key: bk,
                },
            ) => a == b && ak == bk,
            (
                Self::BoolLabel {
                    key: ak,
                    truthy: at,
                    falsy: af,
                },
                Self::BoolLabel {
                    key: bk,
                    truthy: bt,
                    falsy: bf,
                },
            ) => ak == bk && at == bt && af == bf,
            (Self::Plain, Self::Plain) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
            Self::OptionLabel {
                options,
                column_key,
            } => f
                .debug_struct("OptionLabel")
                .field("options", options)
                .field("column_key", column_key)
                .finish(),
            Self::BoolLabel { key, truthy, falsy } => f
                .debug_struct("BoolLabel")
                .field("key", key)
                .field("truthy", truthy)
                .field("falsy", falsy)
                .finish(),
            Self::Plain => f.write_str("Plain"),
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Dropdown the rendering collaborator shows for a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterWidget {
    Text,
    Date,
}

/// One selectable entry of a discrete filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChoice {
    pub value: String,
    pub text: String,
}

/// Predicate used by a discrete filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceMatch {
    /// The stored value starts with the candidate (the first element for arrays).
    Prefix,
    /// The stringified stored value equals the candidate.
    Exact,
}

/// Filter bundle attached to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnFilter {
    /// Free-text or date search over one record property.
    Search { widget: FilterWidget, key: String },
    /// Discrete choice over the field options.
    Choice {
        choices: Vec<FilterChoice>,
        multiple: bool,
        matcher: ChoiceMatch,
        key: String,
    },
}

impl ColumnFilter {
    /// Whether several candidates may be selected at once.
    #[must_use]
    pub fn filter_multiple(&self) -> bool {
        match self {
            Self::Search { .. } => false,
            Self::Choice { multiple, .. } => *multiple,
        }
    }

    /// Evaluates the filter predicate for one candidate against one record.
    #[must_use]
    pub fn matches(&self, candidate: &str, record: &Record) -> bool {
        match self {
            Self::Search { key, .. } => {
                let Some(value) = record.get(key).filter(|v| is_truthy(v)) else {
                    return false;
                };
                let text = match value {
                    Value::Object(obj) => match obj.get("name") {
                        Some(name) => display_string(name),
                        None => return false,
                    },
                    other => display_string(other),
                };
                text.to_lowercase().contains(&candidate.to_lowercase())
            }
            Self::Choice {
                matcher: ChoiceMatch::Prefix,
                key,
                ..
            } => match record.get(key) {
                None => false,
                Some(Value::String(s)) => s.starts_with(candidate),
                Some(Value::Array(items)) => items
                    .first()
                    .is_some_and(|first| first.as_str() == Some(candidate)),
                Some(other) => display_string(other).starts_with(candidate),
            },
            Self::Choice {
                matcher: ChoiceMatch::Exact,
                key,
                ..
            } => record
                .get(key)
                .is_some_and(|value| display_string(value) == candidate),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnDescriptor
// ---------------------------------------------------------------------------

/// Render-ready specification of one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub title: String,
    pub key: String,
    pub data_index: String,
    pub sorter: Option<Comparator>,
    pub filter: Option<ColumnFilter>,
    pub render: Renderer,
}

impl ColumnDescriptor {
    /// Display text of this column for `record`.
    #[must_use]
    pub fn render_cell(&self, record: &Record) -> String {
        let value = record.get(&self.data_index).unwrap_or(&Value::Null);
        self.render.render(value, record)
    }
}

/// Projects `fields` into columns, dropping fields hidden for
/// [`Context::Column`] and preserving order.
#[must_use]
pub fn project(fields: &[FieldDescriptor]) -> Vec<ColumnDescriptor> {
    fields
        .iter()
        .filter(|field| !field.is_hidden_in(Context::Column))
        .map(|field| ColumnDescriptor {
            title: field.title.clone(),
            key: field.key.clone(),
            data_index: field.key.clone(),
            sorter: field.sorter.then(|| Comparator {
                kind: SortKind::for_type(field.field_type),
                key: field.key.clone(),
            }),
            filter: resolve_filter(field),
            render: resolve_render(field),
        })
        .collect()
}

fn resolve_render(field: &FieldDescriptor) -> Renderer {
    if let Some(render) = &field.render {
        return Renderer::Custom(Arc::clone(render));
    }
    match field.field_type {
        FieldType::Radio | FieldType::Select => Renderer::OptionLabel {
            options: field.options.clone(),
            column_key: field.column_key.clone(),
        },
        FieldType::Bool => Renderer::BoolLabel {
            key: field.key.clone(),
            truthy: field.options.get("true").cloned().unwrap_or_default(),
            falsy: field.options.get("false").cloned().unwrap_or_default(),
        },
        FieldType::String | FieldType::Number | FieldType::Date => Renderer::Plain,
    }
}

fn resolve_filter(field: &FieldDescriptor) -> Option<ColumnFilter> {
    if !field.filter {
        return None;
    }
    let choices = || -> Vec<FilterChoice> {
        field
            .options
            .iter()
            .map(|(value, text)| FilterChoice {
                value: value.clone(),
                text: text.clone(),
            })
            .collect()
    };
    let filter = match field.field_type {
        FieldType::String | FieldType::Number | FieldType::Select => ColumnFilter::Search {
            widget: FilterWidget::Text,
            key: field.data_key().to_string(),
        },
        FieldType::Date => ColumnFilter::Search {
            widget: FilterWidget::Date,
            key: field.data_key().to_string(),
        },
        FieldType::Radio => ColumnFilter::Choice {
            choices: choices(),
            multiple: field.options.len() > 2,
            matcher: ChoiceMatch::Prefix,
            key: field.key.clone(),
        },
        FieldType::Bool => ColumnFilter::Choice {
            choices: choices(),
            multiple: false,
            matcher: ChoiceMatch::Exact,
            key: field.key.clone(),
        },
    };
    Some(filter)
}

// ---------------------------------------------------------------------------
// ColumnProjector
// ---------------------------------------------------------------------------

/// Memoizing wrapper around [`project`], keyed by schema identity.
#[derive(Debug, Default)]
pub struct ColumnProjector {
    cached: Option<(Schema, Arc<[ColumnDescriptor]>)>,
}

impl ColumnProjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns for `schema`, recomputed only when the schema identity changes.
    pub fn project(&mut self, schema: &Schema) -> Arc<[ColumnDescriptor]> {
        if let Some((cached_schema, columns)) = &self.cached {
            if cached_schema.ptr_eq(schema) {
                return Arc::clone(columns);
            }
        }
        let columns: Arc<[ColumnDescriptor]> = project(schema.fields()).into();
        debug!(columns = columns.len(), "projected columns");
        self.cached = Some((schema.clone(), Arc::clone(&columns)));
        columns
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    fn active_field() -> FieldDescriptor {
        FieldDescriptor::new("active", FieldType::Bool)
            .with_title("Active")
            .with_options([("true", "Yes"), ("false", "No")])
            .filterable()
    }

    #[test]
    fn bool_column_renders_label_and_filters_by_string() {
        let columns = project(&[active_field()]);
        let column = &columns[0];
        let row = record(json!({"id": 1, "active": true}));

        assert_eq!(column.render_cell(&row), "Yes");
        assert_eq!(
            column.render_cell(&record(json!({"id": 2, "active": false}))),
            "No"
        );

        let filter = column.filter.as_ref().unwrap();
        assert!(!filter.filter_multiple());
        assert!(filter.matches("true", &row));
        assert!(!filter.matches("false", &row));
        assert!(!filter.matches("true", &record(json!({"id": 3}))));
    }

    #[test]
    fn hidden_columns_are_excluded_in_order() {
        let fields = vec![
            FieldDescriptor::new("a", FieldType::String),
            FieldDescriptor::new("b", FieldType::String).hidden_in(Context::Column),
            FieldDescriptor::new("c", FieldType::Number).hidden_in(Context::Form),
        ];
        let keys: Vec<String> = project(&fields).into_iter().map(|c| c.key).collect();
        assert_eq!(keys, ["a", "c"]);
    }

    #[test]
    fn sorter_kind_follows_type() {
        let fields = vec![
            FieldDescriptor::new("n", FieldType::Number).sortable(),
            FieldDescriptor::new("b", FieldType::Bool).sortable(),
            FieldDescriptor::new("d", FieldType::Date).sortable(),
            FieldDescriptor::new("s", FieldType::String),
        ];
        let kinds: Vec<Option<SortKind>> = project(&fields)
            .iter()
            .map(|c| c.sorter.as_ref().map(|s| s.kind))
            .collect();
        assert_eq!(
            kinds,
            [
                Some(SortKind::Number),
                Some(SortKind::Bool),
                Some(SortKind::String),
                None
            ]
        );
    }

    #[test]
    fn comparators_order_records() {
        let low = record(json!({"n": 2, "b": false, "s": "apple"}));
        let high = record(json!({"n": 10, "b": true, "s": "banana"}));
        let number = Comparator {
            kind: SortKind::Number,
            key: "n".into(),
        };
        let boolean = Comparator {
            kind: SortKind::Bool,
            key: "b".into(),
        };
        let string = Comparator {
            kind: SortKind::String,
            key: "s".into(),
        };
        assert_eq!(number.compare(&low, &high), Ordering::Less);
        assert_eq!(boolean.compare(&high, &low), Ordering::Greater);
        assert_eq!(string.compare(&low, &high), Ordering::Less);
        assert_eq!(number.compare(&low, &record(json!({}))), Ordering::Greater);
    }

    #[test]
    fn select_renders_option_label_or_column_key() {
        let plain = FieldDescriptor::new("country", FieldType::Select)
            .with_options([("1", "Spain"), ("2", "France")]);
        let aliased = plain.clone().with_column_key("countryName");
        let columns = project(&[plain, aliased]);
        let row = record(json!({"country": 2, "countryName": "République"}));

        assert_eq!(columns[0].render_cell(&row), "France");
        assert_eq!(columns[1].render_cell(&row), "République");
        assert_eq!(columns[0].render_cell(&record(json!({"country": 9}))), "");
    }

    #[test]
    fn explicit_render_wins() {
        let field = FieldDescriptor::new("status", FieldType::Radio)
            .with_options([("a", "Active")])
            .with_render(|value, _| format!("<{}>", display_string(value)));
        let columns = project(&[field]);
        assert_eq!(columns[0].render_cell(&record(json!({"status": "a"}))), "<a>");
    }

    #[test]
    fn search_filter_is_case_insensitive_substring() {
        let field = FieldDescriptor::new("name", FieldType::String).filterable();
        let columns = project(&[field]);
        let filter = columns[0].filter.as_ref().unwrap();
        assert!(matches!(
            filter,
            ColumnFilter::Search {
                widget: FilterWidget::Text,
                ..
            }
        ));
        assert!(filter.matches("ALI", &record(json!({"name": "Alice"}))));
        assert!(!filter.matches("bob", &record(json!({"name": "Alice"}))));
        assert!(!filter.matches("a", &record(json!({}))));
        assert!(!filter.matches("", &record(json!({"name": ""}))));
    }

    #[test]
    fn search_filter_reads_name_of_composite_values() {
        let field = FieldDescriptor::new("country", FieldType::Select)
            .filterable()
            .with_column_key("country");
        let columns = project(&[field]);
        let filter = columns[0].filter.as_ref().unwrap();
        let row = record(json!({"country": {"id": 1, "name": "Spain"}}));
        assert!(filter.matches("spa", &row));
        assert!(!filter.matches("1", &row));
    }

    #[test]
    fn search_filter_uses_column_key() {
        let field = FieldDescriptor::new("country", FieldType::Select)
            .filterable()
            .with_column_key("countryName");
        let columns = project(&[field]);
        let filter = columns[0].filter.as_ref().unwrap();
        assert!(filter.matches(
            "fra",
            &record(json!({"country": 2, "countryName": "France"}))
        ));
    }

    #[test]
    fn date_filter_uses_date_widget() {
        let field = FieldDescriptor::new("created", FieldType::Date).filterable();
        let columns = project(&[field]);
        let filter = columns[0].filter.as_ref().unwrap();
        assert!(matches!(
            filter,
            ColumnFilter::Search {
                widget: FilterWidget::Date,
                ..
            }
        ));
        assert!(filter.matches("2024-03", &record(json!({"created": "2024-03-01"}))));
    }

    #[test]
    fn radio_filter_is_prefix_choice() {
        let two = FieldDescriptor::new("role", FieldType::Radio)
            .with_options([("admin", "Admin"), ("user", "User")])
            .filterable();
        let three = FieldDescriptor::new("tier", FieldType::Radio)
            .with_options([("a", "A"), ("b", "B"), ("c", "C")])
            .filterable();
        let columns = project(&[two, three]);

        let role = columns[0].filter.as_ref().unwrap();
        assert!(!role.filter_multiple());
        assert!(role.matches("admin", &record(json!({"role": "admin"}))));
        assert!(role.matches("ad", &record(json!({"role": "admin"}))));
        assert!(!role.matches("min", &record(json!({"role": "admin"}))));
        assert!(role.matches("user", &record(json!({"role": ["user", "admin"]}))));
        assert!(!role.matches("admin", &record(json!({"role": ["user", "admin"]}))));
        assert!(!role.matches("admin", &record(json!({}))));

        let ColumnFilter::Choice { choices, .. } = role else {
            panic!("expected a choice filter");
        };
        assert_eq!(
            choices,
            &[
                FilterChoice {
                    value: "admin".into(),
                    text: "Admin".into()
                },
                FilterChoice {
                    value: "user".into(),
                    text: "User".into()
                },
            ]
        );

        assert!(columns[1].filter.as_ref().unwrap().filter_multiple());
    }

    #[test]
    fn no_filter_unless_requested() {
        let columns = project(&[FieldDescriptor::new("name", FieldType::String)]);
        assert!(columns[0].filter.is_none());
        assert!(columns[0].sorter.is_none());
    }

    #[test]
    fn projector_memoizes_by_schema_identity() {
        let schema = Schema::new(vec![active_field()]).unwrap();
        let mut projector = ColumnProjector::new();

        let first = projector.project(&schema);
        let second = projector.project(&schema.clone());
        assert!(Arc::ptr_eq(&first, &second));

        let rebuilt = Schema::new(vec![active_field()]).unwrap();
        let third = projector.project(&rebuilt);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(&*first, &*third);
    }

    #[test]
    fn projection_does_not_touch_the_schema() {
        let field = FieldDescriptor::new("tier", FieldType::Select).with_options([("a", "A")]);
        let schema = Schema::new(vec![field]).unwrap();
        let _ = project(schema.fields());
        assert!(schema.fields()[0].render.is_none());
    }

    fn arb_field_type() -> impl Strategy<Value = FieldType> {
        prop_oneof![
            Just(FieldType::String),
            Just(FieldType::Number),
            Just(FieldType::Bool),
            Just(FieldType::Date),
            Just(FieldType::Radio),
            Just(FieldType::Select),
        ]
    }

    fn arb_field() -> impl Strategy<Value = (FieldType, bool, bool, usize)> {
        (arb_field_type(), any::<bool>(), any::<bool>(), 0usize..5)
    }

    proptest! {
        #[test]
        fn projection_keeps_visible_fields_once_in_order(
            specs in proptest::collection::vec(arb_field(), 0..12)
        ) {
            let fields: Vec<FieldDescriptor> = specs
                .iter()
                .enumerate()
                .map(|(i, (field_type, hidden, filter, option_count))| {
                    let mut field = FieldDescriptor::new(format!("f{i}"), *field_type)
                        .with_options((0..*option_count).map(|o| (format!("o{o}"), format!("O{o}"))));
                    field.filter = *filter;
                    if *hidden {
                        field = field.hidden_in(Context::Column);
                    }
                    field
                })
                .collect();

            let expected: Vec<&str> = fields
                .iter()
                .filter(|f| !f.is_hidden_in(Context::Column))
                .map(|f| f.key.as_str())
                .collect();
            let columns = project(&fields);
            let actual: Vec<&str> = columns.iter().map(|c| c.key.as_str()).collect();
            prop_assert_eq!(actual, expected);

            for (column, field) in columns.iter().zip(fields.iter().filter(|f| !f.is_hidden_in(Context::Column))) {
                match (field.field_type, column.filter.as_ref()) {
                    (FieldType::Bool, Some(filter)) => {
                        prop_assert!(!filter.filter_multiple());
                    }
                    (FieldType::Radio, Some(filter)) => {
                        prop_assert_eq!(filter.filter_multiple(), field.options.len() > 2);
                    }
                    (_, None) => {
                        prop_assert!(!field.filter);
                    }
                    _ => {}
                }
            }

            prop_assert_eq!(project(&fields), columns);
        }
    }
}
