//! Error types for schema construction.

use thiserror::Error;

/// Errors raised while building a [`Schema`](crate::schema::Schema).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two descriptors share the same key.
    #[error("duplicate field key: {key}")]
    DuplicateKey { key: String },

    /// A dependency block declares no prerequisite fields.
    #[error("field '{key}' declares dependencies without any prerequisite fields")]
    EmptyDependencies { key: String },

    /// A dependency names a field that is not part of the schema.
    #[error("field '{key}' depends on unknown field '{dependency}'")]
    UnknownDependency { key: String, dependency: String },

    /// The declarative JSON form could not be parsed.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SchemaError::DuplicateKey {
            key: "email".into(),
        };
        assert_eq!(err.to_string(), "duplicate field key: email");
    }

    #[test]
    fn dependency_error_names_both_fields() {
        let err = SchemaError::UnknownDependency {
            key: "city".into(),
            dependency: "country".into(),
        };
        assert!(err.to_string().contains("city"));
        assert!(err.to_string().contains("country"));
    }
}
