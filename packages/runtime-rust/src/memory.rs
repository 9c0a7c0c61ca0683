//! In-memory [`DataAccess`] driven by per-operation handlers.
//!
//! Every call is appended to a log so tests can assert on what the
//! controllers sent. Live queries are plain channels: [`MemoryDataAccess::publish`]
//! pushes to them, and every mutation re-runs its declared refetches and
//! publishes their results to watchers of the same operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crudkit_core::QueryDescriptor;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::traits::{DataAccess, MutationRequest, Subscription};

/// Produces the payload for one operation call.
pub type Handler = Arc<dyn Fn(&QueryDescriptor) -> anyhow::Result<Value> + Send + Sync>;

/// One recorded call against the data layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query(QueryDescriptor),
    Watch(QueryDescriptor),
    Mutate(MutationRequest),
}

impl Call {
    /// Operation name of the query or mutation.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Query(q) | Self::Watch(q) => &q.operation,
            Self::Mutate(request) => &request.mutation.operation,
        }
    }
}

#[derive(Default)]
struct Inner {
    handlers: HashMap<String, Handler>,
    latency: HashMap<String, Duration>,
    watchers: Vec<(String, mpsc::Sender<Value>)>,
    calls: Vec<Call>,
}

/// Handler-driven data layer for tests and demos.
pub struct MemoryDataAccess {
    inner: Mutex<Inner>,
    buffer: usize,
}

impl Default for MemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDataAccess {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::default(),
            buffer: 16,
        }
    }

    /// Registers the handler for `operation`, replacing any previous one.
    pub fn on<F>(&self, operation: impl Into<String>, handler: F)
    where
        F: Fn(&QueryDescriptor) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .handlers
            .insert(operation.into(), Arc::new(handler));
    }

    /// Answers `operation` with a fixed payload.
    pub fn respond(&self, operation: impl Into<String>, payload: Value) {
        self.on(operation, move |_| Ok(payload.clone()));
    }

    /// Fails every call to `operation` with `message`.
    pub fn fail(&self, operation: impl Into<String>, message: &'static str) {
        self.on(operation, move |_| Err(anyhow::anyhow!(message)));
    }

    /// Delays every call to `operation`. A zero duration removes the delay.
    pub fn set_latency(&self, operation: impl Into<String>, latency: Duration) {
        let operation = operation.into();
        let mut inner = self.inner.lock();
        if latency.is_zero() {
            inner.latency.remove(&operation);
        } else {
            inner.latency.insert(operation, latency);
        }
    }

    /// Pushes `payload` to every live query of `operation`.
    /// Returns the number of subscribers reached.
    pub fn publish(&self, operation: &str, payload: &Value) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|(_, tx)| !tx.is_closed());
        let mut reached = 0;
        for (_, tx) in inner.watchers.iter().filter(|(op, _)| op == operation) {
            match tx.try_send(payload.clone()) {
                Ok(()) => reached += 1,
                Err(e) => warn!(operation, error = %e, "dropping live query push"),
            }
        }
        reached
    }

    /// Snapshot of the call log, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Number of one-shot queries issued for `operation`.
    #[must_use]
    pub fn query_count(&self, operation: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Query(q) if q.operation == operation))
            .count()
    }

    /// Mutations sent so far, oldest first.
    #[must_use]
    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Mutate(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of live queries still open.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|(_, tx)| !tx.is_closed());
        inner.watchers.len()
    }

    async fn run(&self, query: &QueryDescriptor) -> anyhow::Result<Value> {
        let (handler, latency) = {
            let inner = self.inner.lock();
            (
                inner.handlers.get(&query.operation).cloned(),
                inner.latency.get(&query.operation).copied(),
            )
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let handler =
            handler.ok_or_else(|| anyhow::anyhow!("no handler for '{}'", query.operation))?;
        handler(query)
    }
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    async fn query(&self, query: &QueryDescriptor) -> anyhow::Result<Value> {
        self.inner.lock().calls.push(Call::Query(query.clone()));
        self.run(query).await
    }

    async fn watch_query(&self, query: &QueryDescriptor) -> anyhow::Result<Subscription> {
        let (tx, subscription) = Subscription::channel(self.buffer);
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Watch(query.clone()));
        inner.watchers.push((query.operation.clone(), tx));
        Ok(subscription)
    }

    async fn mutate(&self, request: &MutationRequest) -> anyhow::Result<Value> {
        self.inner.lock().calls.push(Call::Mutate(request.clone()));
        let payload = self.run(&request.mutation).await?;
        for query in &request.refetch {
            match self.run(query).await {
                Ok(result) => {
                    let reached = self.publish(&query.operation, &result);
                    debug!(operation = %query.operation, reached, "refetched");
                }
                Err(e) => warn!(operation = %query.operation, error = %e, "refetch failed"),
            }
        }
        Ok(payload)
    }
}
