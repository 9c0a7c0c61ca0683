use async_trait::async_trait;
use crudkit_core::QueryDescriptor;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::CrudError;

/// Remote query/mutation executor the controllers run against.
/// Implementations: GraphQL/REST clients (external), memory (tests).
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Run a one-shot read and return its response payload.
    async fn query(&self, query: &QueryDescriptor) -> anyhow::Result<Value>;

    /// Open a live subscription delivering a full payload on every change.
    async fn watch_query(&self, query: &QueryDescriptor) -> anyhow::Result<Subscription>;

    /// Run a mutation, then the declared refetches, and return the mutation payload.
    async fn mutate(&self, request: &MutationRequest) -> anyhow::Result<Value>;
}

/// A mutation together with the reads that must be reissued after it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationRequest {
    pub mutation: QueryDescriptor,
    pub refetch: Vec<QueryDescriptor>,
}

impl MutationRequest {
    #[must_use]
    pub fn new(mutation: QueryDescriptor) -> Self {
        Self {
            mutation,
            refetch: Vec::new(),
        }
    }

    #[must_use]
    pub fn refetching(mut self, query: QueryDescriptor) -> Self {
        self.refetch.push(query);
        self
    }
}

/// Stream of payloads pushed by a live query.
///
/// Dropping the subscription closes it; the producer sees a closed channel.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Value>,
}

impl Subscription {
    /// Creates a bounded subscription and the sender that feeds it.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<Value>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Next pushed payload, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// Observability collaborator for errors caught at a controller boundary.
///
/// Used as `Arc<dyn ErrorSink>`.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &CrudError);
}
