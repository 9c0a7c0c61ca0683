//! Controller and source configuration.

use std::time::Duration;

use crudkit_core::{FieldDescriptor, RemoteSource, Schema, SchemaError};
use serde::Deserialize;

/// Runtime knobs shared by the list and form controllers.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Whether the list controller opens a live subscription on activation.
    pub live_updates: bool,
    /// Upper bound on every remote call. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            live_updates: true,
            request_timeout: None,
        }
    }
}

/// A schema together with the remote sources a CRUD screen is bound to.
#[derive(Debug, Clone)]
pub struct CrudConfig {
    pub schema: Schema,
    /// List query, also used for the live subscription.
    pub get_list: RemoteSource,
    /// Point read of a single record.
    pub get_by_key: RemoteSource,
    pub delete: RemoteSource,
    /// Upsert mutation used by form submission.
    pub post: RemoteSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrudConfigSpec {
    fields: serde_json::Value,
    get_list: RemoteSource,
    get_by_key: RemoteSource,
    delete: RemoteSource,
    post: RemoteSource,
}

impl CrudConfig {
    /// Parses the declarative form: a `fields` array plus the four sources.
    ///
    /// Closures (renderers, dependency hooks, option mappers beyond the
    /// key-based default) are attached afterwards with [`CrudConfig::with_fields`].
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Json` for malformed documents and the schema
    /// validation errors of [`Schema::new`].
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let spec: CrudConfigSpec = serde_json::from_str(json)?;
        Ok(Self {
            schema: Schema::from_json(&spec.fields.to_string())?,
            get_list: spec.get_list,
            get_by_key: spec.get_by_key,
            delete: spec.delete,
            post: spec.post,
        })
    }

    /// Rebuilds the schema after transforming its fields.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`Schema::new`].
    pub fn with_fields<F>(mut self, f: F) -> Result<Self, SchemaError>
    where
        F: FnOnce(Vec<FieldDescriptor>) -> Vec<FieldDescriptor>,
    {
        self.schema = Schema::new(f(self.schema.fields().to_vec()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use crudkit_core::{Context, FieldPatch, FieldType};

    use super::*;

    const DOCUMENT: &str = r#"{
        "fields": [
            {"key": "name", "title": "Name", "type": "string", "sorter": true, "required": true},
            {"key": "country", "title": "Country", "type": "select",
             "configOptions": {"query": {"operation": "countries"}, "accessData": "countries"}},
            {"key": "city", "title": "City", "type": "select", "hidden": ["form"]}
        ],
        "getList": {"query": {"operation": "users"}, "accessData": "users"},
        "getByKey": {"query": {"operation": "user"}, "accessData": "user"},
        "delete": {"query": {"operation": "deleteUser"}, "accessData": "deleteUser"},
        "post": {"query": {"operation": "saveUser"}, "accessData": "saveUser", "keyName": "userId"}
    }"#;

    #[test]
    fn default_config_values() {
        let config = ControllerConfig::default();
        assert!(config.live_updates);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn parses_declarative_document() {
        let config = CrudConfig::from_json(DOCUMENT).unwrap();
        assert_eq!(config.schema.len(), 3);
        assert_eq!(config.get_list.query.operation, "users");
        assert_eq!(config.get_by_key.key_name(), "id");
        assert_eq!(config.post.key_name(), "userId");
        let country = config.schema.get("country").unwrap();
        assert!(country.has_remote_options());
        assert!(config.schema.get("city").unwrap().is_hidden_in(Context::Form));
    }

    #[test]
    fn with_fields_attaches_closures() {
        let config = CrudConfig::from_json(DOCUMENT)
            .unwrap()
            .with_fields(|fields| {
                fields
                    .into_iter()
                    .map(|f| {
                        if f.key == "city" {
                            f.with_dependencies(&["country"], FieldPatch::reveal)
                        } else {
                            f
                        }
                    })
                    .collect()
            })
            .unwrap();
        assert!(config.schema.get("city").unwrap().dependencies.is_some());
        assert_eq!(config.schema.get("name").unwrap().field_type, FieldType::String);
    }

    #[test]
    fn rejects_bad_dependency() {
        let err = CrudConfig::from_json(DOCUMENT)
            .unwrap()
            .with_fields(|fields| {
                fields
                    .into_iter()
                    .map(|f| f.with_dependencies(&["missing"], FieldPatch::default))
                    .collect()
            })
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_missing_source() {
        let err = CrudConfig::from_json(r#"{"fields": []}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
    }
}
