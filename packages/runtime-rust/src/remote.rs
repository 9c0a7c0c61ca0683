//! Remote call wrapper: optional timeout plus error classification.

use std::future::Future;
use std::time::Duration;

use crate::error::CrudError;

/// Which controller-boundary error a failed call becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Query,
    Subscribe,
    Mutation,
}

impl CallKind {
    fn wrap(self, operation: &str, source: anyhow::Error) -> CrudError {
        let operation = operation.to_string();
        match self {
            Self::Query => CrudError::Query { operation, source },
            Self::Subscribe => CrudError::Subscribe { operation, source },
            Self::Mutation => CrudError::Mutation { operation, source },
        }
    }
}

/// Awaits `fut`, bounded by `timeout` when one is configured.
pub(crate) async fn call<T, F>(
    timeout: Option<Duration>,
    kind: CallKind,
    operation: &str,
    fut: F,
) -> Result<T, CrudError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_elapsed) => {
                return Err(CrudError::Timeout {
                    operation: operation.to_string(),
                    timeout: limit,
                })
            }
        },
        None => fut.await,
    };
    result.map_err(|source| kind.wrap(operation, source))
}
