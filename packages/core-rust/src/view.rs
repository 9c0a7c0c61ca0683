//! Applying column filters and sorting to a row set.

use serde::{Deserialize, Serialize};

use crate::columns::ColumnDescriptor;
use crate::types::Record;

/// Sort direction for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Active sort: one column key and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

/// Selected filter candidates for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub column: String,
    pub values: Vec<String>,
}

/// Table interaction state held by the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub sort: Option<SortState>,
    #[serde(default)]
    pub filters: Vec<FilterState>,
}

impl ViewState {
    #[must_use]
    pub fn sorted_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortState {
            column: column.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn filtered_by<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(FilterState {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Filters and sorts `rows` with the predicates carried by `columns`.
///
/// Candidates of one column are OR-ed, columns are AND-ed. Filters or sorts
/// naming a column without the matching capability are ignored, as are
/// filters with no candidates. Sorting is stable.
#[must_use]
pub fn apply_view(rows: &[Record], columns: &[ColumnDescriptor], view: &ViewState) -> Vec<Record> {
    let active: Vec<_> = view
        .filters
        .iter()
        .filter(|state| !state.values.is_empty())
        .filter_map(|state| {
            columns
                .iter()
                .find(|c| c.key == state.column)
                .and_then(|c| c.filter.as_ref())
                .map(|filter| (filter, &state.values))
        })
        .collect();

    let mut visible: Vec<Record> = rows
        .iter()
        .filter(|row| {
            active
                .iter()
                .all(|(filter, values)| values.iter().any(|v| filter.matches(v, row)))
        })
        .cloned()
        .collect();

    let comparator = view.sort.as_ref().and_then(|sort| {
        columns
            .iter()
            .find(|c| c.key == sort.column)
            .and_then(|c| c.sorter.as_ref())
            .map(|comparator| (comparator, sort.direction))
    });
    if let Some((comparator, direction)) = comparator {
        visible.sort_by(|a, b| {
            let ordering = comparator.compare(a, b);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    visible
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::columns::project;
    use crate::schema::{FieldDescriptor, FieldType};

    fn rows() -> Vec<Record> {
        [
            json!({"id": 1, "name": "Carol", "age": 41, "active": true, "role": "admin"}),
            json!({"id": 2, "name": "alice", "age": 29, "active": false, "role": "user"}),
            json!({"id": 3, "name": "Bob", "age": 35, "active": true, "role": "user"}),
        ]
        .into_iter()
        .filter_map(|v: Value| v.as_object().cloned())
        .collect()
    }

    fn columns() -> Vec<ColumnDescriptor> {
        project(&[
            FieldDescriptor::new("name", FieldType::String)
                .sortable()
                .filterable(),
            FieldDescriptor::new("age", FieldType::Number).sortable(),
            FieldDescriptor::new("active", FieldType::Bool)
                .with_options([("true", "Yes"), ("false", "No")])
                .filterable(),
            FieldDescriptor::new("role", FieldType::Radio)
                .with_options([("admin", "Admin"), ("user", "User")])
                .filterable(),
        ])
    }

    fn ids(rows: &[Record]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn default_view_keeps_rows() {
        let result = apply_view(&rows(), &columns(), &ViewState::default());
        assert_eq!(ids(&result), [1, 2, 3]);
    }

    #[test]
    fn numeric_sort_both_directions() {
        let up = ViewState::default().sorted_by("age", SortDirection::Ascending);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &up)), [2, 3, 1]);
        let down = ViewState::default().sorted_by("age", SortDirection::Descending);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &down)), [1, 3, 2]);
    }

    #[test]
    fn string_sort_is_lexicographic() {
        let view = ViewState::default().sorted_by("name", SortDirection::Ascending);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [3, 1, 2]);
    }

    #[test]
    fn filters_or_within_and_across_columns() {
        let view = ViewState::default().filtered_by("role", ["admin", "user"]);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [1, 2, 3]);

        let view = view.filtered_by("active", ["true"]);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [1, 3]);

        let view = view.filtered_by("name", ["b"]);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [3]);
    }

    #[test]
    fn unknown_or_incapable_columns_are_ignored() {
        let view = ViewState::default()
            .filtered_by("age", ["41"])
            .filtered_by("missing", ["x"])
            .filtered_by("name", Vec::<String>::new())
            .sorted_by("active", SortDirection::Descending);
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [1, 2, 3]);
    }

    #[test]
    fn view_state_deserializes() {
        let view: ViewState = serde_json::from_value(json!({
            "sort": {"column": "age", "direction": "descending"},
            "filters": [{"column": "role", "values": ["user"]}]
        }))
        .unwrap();
        assert_eq!(ids(&apply_view(&rows(), &columns(), &view)), [3, 2]);
    }
}
