//! Errors caught at the controller boundary.

use std::time::Duration;

use crudkit_core::FieldError;
use thiserror::Error;

/// A failure surfaced to the [`ErrorSink`](crate::ErrorSink).
///
/// Controllers never return these to their callers; they report them and
/// clear their loading flag.
#[derive(Debug, Error)]
pub enum CrudError {
    /// A one-shot read failed.
    #[error("query '{operation}' failed: {source}")]
    Query {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// A live query could not be opened.
    #[error("subscription '{operation}' failed: {source}")]
    Subscribe {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// A mutation failed.
    #[error("mutation '{operation}' failed: {source}")]
    Mutation {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// A remote call exceeded the configured request timeout.
    #[error("'{operation}' timed out after {}ms", .timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Submitted values failed validation; nothing was sent.
    #[error("invalid values: {}", join_errors(.0))]
    Invalid(Vec<FieldError>),
}

impl CrudError {
    /// Name of the remote operation involved, if any.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Query { operation, .. }
            | Self::Subscribe { operation, .. }
            | Self::Mutation { operation, .. }
            | Self::Timeout { operation, .. } => Some(operation),
            Self::Invalid(_) => None,
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use crudkit_core::FieldErrorKind;

    use super::*;

    #[test]
    fn query_error_display() {
        let err = CrudError::Query {
            operation: "users".into(),
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.to_string(), "query 'users' failed: connection refused");
        assert_eq!(err.operation(), Some("users"));
    }

    #[test]
    fn timeout_display() {
        let err = CrudError::Timeout {
            operation: "user".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "'user' timed out after 250ms");
    }

    #[test]
    fn invalid_lists_every_field() {
        let err = CrudError::Invalid(vec![
            FieldError {
                key: "name".into(),
                kind: FieldErrorKind::Required,
            },
            FieldError {
                key: "age".into(),
                kind: FieldErrorKind::InvalidNumber,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "invalid values: 'name' is required, 'age' must be a number"
        );
        assert_eq!(err.operation(), None);
    }
}
