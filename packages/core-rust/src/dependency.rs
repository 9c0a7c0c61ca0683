//! Cross-field dependency gates.
//!
//! A field declaring `dependencies` stays inert until every listed sibling
//! holds a truthy value. The gate is only re-evaluated when at least one of
//! those siblings is among the changed keys.

use crate::schema::{Dependencies, FieldDescriptor, FieldPatch};
use crate::types::{is_truthy, Record};

/// Evaluates `field`'s dependency gate.
///
/// Returns the patch produced by `on_change` when one of the prerequisites
/// is in `changed_keys` and all of them are truthy in `values`. An empty
/// prerequisite list never fires.
pub fn resolve<S: AsRef<str>>(
    field: &FieldDescriptor,
    values: &Record,
    changed_keys: &[S],
) -> Option<FieldPatch> {
    let deps = field.dependencies.as_ref()?;
    let touched = deps
        .fields
        .iter()
        .any(|dep| changed_keys.iter().any(|key| key.as_ref() == dep));
    if touched && gate_open(deps, values) {
        Some((deps.on_change)())
    } else {
        None
    }
}

/// Whether every prerequisite holds a truthy value.
#[must_use]
pub fn gate_open(deps: &Dependencies, values: &Record) -> bool {
    !deps.fields.is_empty()
        && deps
            .fields
            .iter()
            .all(|dep| values.get(dep).is_some_and(is_truthy))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::*;
    use crate::schema::FieldType;

    fn city_field(prerequisites: &[&str]) -> FieldDescriptor {
        FieldDescriptor::new("city", FieldType::Select)
            .with_dependencies(prerequisites, FieldPatch::reveal)
    }

    fn values(v: Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn no_dependencies_is_noop() {
        let field = FieldDescriptor::new("name", FieldType::String);
        assert!(resolve(&field, &values(json!({"name": "x"})), &["name"]).is_none());
    }

    #[test]
    fn fires_when_single_prerequisite_changes_and_holds_value() {
        let field = city_field(&["country"]);
        let patch = resolve(&field, &values(json!({"country": "es"})), &["country"]);
        assert_eq!(patch, Some(FieldPatch::reveal()));
    }

    #[test]
    fn ignores_unrelated_changes() {
        let field = city_field(&["country"]);
        assert!(resolve(&field, &values(json!({"country": "es"})), &["name"]).is_none());
    }

    #[test]
    fn falsy_prerequisite_keeps_gate_closed() {
        let field = city_field(&["country"]);
        for falsy in [json!(""), json!(null), json!(0), json!(false)] {
            let current = values(json!({ "country": falsy }));
            assert!(resolve(&field, &current, &["country"]).is_none());
        }
    }

    #[test]
    fn all_prerequisites_must_hold() {
        let field = city_field(&["country", "region"]);
        let partial = values(json!({"country": "es"}));
        assert!(resolve(&field, &partial, &["country"]).is_none());

        let complete = values(json!({"country": "es", "region": "an"}));
        assert!(resolve(&field, &complete, &["region"]).is_some());
        assert!(resolve(&field, &complete, &["country"]).is_some());
    }

    #[test]
    fn empty_prerequisites_are_inert() {
        let field = city_field(&[]);
        let current = values(json!({"country": "es"}));
        assert!(resolve(&field, &current, &["country"]).is_none());
        assert!(!gate_open(field.dependencies.as_ref().unwrap(), &current));
    }

    #[test]
    fn on_change_runs_once_per_open_gate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let field = FieldDescriptor::new("city", FieldType::Select).with_dependencies(
            &["country"],
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                FieldPatch::default()
            },
        );
        let current = values(json!({"country": "es"}));
        resolve(&field, &current, &["country"]);
        resolve(&field, &current, &["name"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accepts_owned_key_lists() {
        let field = city_field(&["country"]);
        let changed: Vec<String> = vec!["country".to_string()];
        assert!(resolve(&field, &values(json!({"country": 1})), &changed).is_some());
    }

    proptest! {
        /// The gate fires iff every prerequisite is truthy, whichever
        /// non-empty subset of prerequisites was reported as changed.
        #[test]
        fn gate_is_an_and_over_prerequisites(
            present in proptest::collection::vec(any::<bool>(), 1..5),
            changed_mask in proptest::collection::vec(any::<bool>(), 1..5),
        ) {
            let names: Vec<String> = (0..present.len()).map(|i| format!("dep{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let field = city_field(&refs);

            let mut current = Record::new();
            for (name, has_value) in names.iter().zip(&present) {
                current.insert(name.clone(), if *has_value { json!("x") } else { json!("") });
            }

            let mut changed: Vec<&str> = names
                .iter()
                .zip(changed_mask.iter().cycle())
                .filter(|(_, c)| **c)
                .map(|(n, _)| n.as_str())
                .collect();
            if changed.is_empty() {
                changed.push(&names[0]);
            }

            let fired = resolve(&field, &current, &changed).is_some();
            prop_assert_eq!(fired, present.iter().all(|p| *p));
        }
    }
}
