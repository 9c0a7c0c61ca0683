//! List controller: a live, re-fetchable row set bound to a list source.
//!
//! Activation issues a one-shot list query and opens a live subscription
//! concurrently. Both replace the row set wholesale. Every activation takes a
//! new generation; results carrying an older generation, or arriving after
//! deactivation, are discarded.

use std::sync::Arc;

use crudkit_core::{
    apply_view, ColumnDescriptor, ColumnProjector, Record, RecordKey, RemoteSource, Schema,
    ViewState,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{ControllerConfig, CrudConfig};
use crate::remote::{call, CallKind};
use crate::traits::{DataAccess, ErrorSink, MutationRequest, Subscription};

// ---------------------------------------------------------------------------
// Public state
// ---------------------------------------------------------------------------

/// `Idle` until activated, `Loading` while a read is outstanding, `Ready` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Idle,
    Loading,
    Ready,
}

/// Point-in-time copy of the row set.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub rows: Vec<Record>,
    pub loading: bool,
    pub phase: ListPhase,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RowSet {
    rows: Vec<Record>,
    loaded: bool,
    active: bool,
    generation: u64,
    /// Calls begun under the current generation and not yet settled.
    pending: usize,
    /// Ticket of the most recently issued list read.
    latest_fetch: u64,
}

/// One list read: the generation it belongs to and its issue order.
#[derive(Debug, Clone, Copy)]
struct Fetch {
    generation: u64,
    ticket: u64,
}

impl RowSet {
    fn is_current(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }

    fn is_loading(&self) -> bool {
        self.pending > 0
    }

    /// Counts an outstanding call against the current generation.
    fn begin(&mut self) -> u64 {
        self.pending += 1;
        self.generation
    }

    /// Retires a call. Calls of an older generation were already dropped
    /// from the count when it was replaced.
    fn settle(&mut self, generation: u64) {
        if self.generation == generation {
            self.pending = self.pending.saturating_sub(1);
        }
    }

    fn next_fetch(&mut self) -> Fetch {
        self.latest_fetch += 1;
        Fetch {
            generation: self.begin(),
            ticket: self.latest_fetch,
        }
    }

    /// Replaces the rows with the list member of `payload`. A payload
    /// without it leaves the rows as they are.
    fn replace(&mut self, list: &RemoteSource, payload: &Value) {
        if let Some(items) = list.extract(payload).and_then(Value::as_array) {
            self.rows = items.iter().filter_map(|v| v.as_object().cloned()).collect();
        } else {
            debug!(access_data = %list.access_data, "list payload without rows");
        }
        self.loaded = true;
    }

    fn phase(&self) -> ListPhase {
        if self.is_loading() {
            ListPhase::Loading
        } else if self.loaded {
            ListPhase::Ready
        } else {
            ListPhase::Idle
        }
    }
}

/// Everything the subscription pump needs, shared with the controller.
struct Shared {
    access: Arc<dyn DataAccess>,
    sink: Arc<dyn ErrorSink>,
    config: ControllerConfig,
    list: RemoteSource,
    delete: RemoteSource,
    state: Mutex<RowSet>,
}

impl Shared {
    /// Applies a live push. Returns `false` once `generation` is stale.
    fn push(&self, generation: u64, payload: &Value) -> bool {
        let mut state = self.state.lock();
        if !state.is_current(generation) {
            return false;
        }
        state.replace(&self.list, payload);
        true
    }

    /// Settles `fetch` and applies its rows unless a newer read was issued
    /// or the generation went stale.
    fn commit(&self, fetch: Fetch, payload: &Value) -> bool {
        let mut state = self.state.lock();
        state.settle(fetch.generation);
        if !state.is_current(fetch.generation) || state.latest_fetch != fetch.ticket {
            return false;
        }
        state.replace(&self.list, payload);
        true
    }

    async fn fetch(&self, fetch: Fetch) {
        let operation = &self.list.query.operation;
        let result = call(
            self.config.request_timeout,
            CallKind::Query,
            operation,
            self.access.query(&self.list.query),
        )
        .await;
        match result {
            Ok(payload) => {
                if !self.commit(fetch, &payload) {
                    warn!(
                        operation = %operation,
                        generation = fetch.generation,
                        ticket = fetch.ticket,
                        "discarding superseded list result"
                    );
                }
            }
            Err(error) => {
                self.state.lock().settle(fetch.generation);
                self.sink.report(&error);
            }
        }
    }

    async fn subscribe(&self) -> Option<Subscription> {
        let operation = &self.list.query.operation;
        let result = call(
            self.config.request_timeout,
            CallKind::Subscribe,
            operation,
            self.access.watch_query(&self.list.query),
        )
        .await;
        match result {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                self.sink.report(&error);
                None
            }
        }
    }
}

/// Applies pushed payloads until the stream ends or the generation goes stale.
fn spawn_pump(shared: Arc<Shared>, mut subscription: Subscription, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = subscription.next().await {
            if !shared.push(generation, &payload) {
                break;
            }
        }
        debug!(generation, "live list query closed");
    })
}

// ---------------------------------------------------------------------------
// ListController
// ---------------------------------------------------------------------------

/// Binds a schema and a list source to a live row set.
///
/// Dropping the controller deactivates it.
pub struct ListController {
    shared: Arc<Shared>,
    schema: Mutex<Schema>,
    projector: Mutex<ColumnProjector>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ListController {
    #[must_use]
    pub fn new(
        crud: &CrudConfig,
        access: Arc<dyn DataAccess>,
        sink: Arc<dyn ErrorSink>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                access,
                sink,
                config,
                list: crud.get_list.clone(),
                delete: crud.delete.clone(),
                state: Mutex::default(),
            }),
            schema: Mutex::new(crud.schema.clone()),
            projector: Mutex::new(ColumnProjector::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Starts (or restarts) the controller and waits for the one-shot read.
    ///
    /// The live subscription keeps running in the background until
    /// [`deactivate`](Self::deactivate) or drop.
    pub async fn activate(&self) {
        let fetch = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.active = true;
            state.pending = 0;
            state.next_fetch()
        };
        let generation = fetch.generation;
        self.abort_watcher();
        debug!(operation = %self.shared.list.query.operation, generation, "activating list");

        if !self.shared.config.live_updates {
            self.shared.fetch(fetch).await;
            return;
        }
        let (subscription, ()) =
            tokio::join!(self.shared.subscribe(), self.shared.fetch(fetch));
        let Some(subscription) = subscription else {
            return;
        };
        let handle = spawn_pump(Arc::clone(&self.shared), subscription, generation);
        if self.shared.state.lock().is_current(generation) {
            if let Some(previous) = self.watcher.lock().replace(handle) {
                previous.abort();
            }
        } else {
            handle.abort();
        }
    }

    /// Stops the subscription and discards every outstanding result.
    pub fn deactivate(&self) {
        {
            let mut state = self.shared.state.lock();
            state.active = false;
            state.pending = 0;
            state.generation += 1;
        }
        self.abort_watcher();
        debug!(operation = %self.shared.list.query.operation, "deactivated list");
    }

    /// Re-enters loading and reissues the list query. No-op while inactive.
    ///
    /// Of several overlapping reads, only the last one issued is applied.
    pub async fn refetch(&self) {
        let fetch = {
            let mut state = self.shared.state.lock();
            if !state.active {
                debug!("refetch ignored on inactive list");
                return;
            }
            state.next_fetch()
        };
        self.shared.fetch(fetch).await;
    }

    /// Deletes the record identified by `key` and refetches the list.
    ///
    /// When the response echoes a positive identifier, the matching row is
    /// removed locally right away. Returns the mutation payload, or `None`
    /// after reporting a failure.
    pub async fn delete(&self, key: RecordKey) -> Option<Value> {
        let shared = &self.shared;
        let key_name = shared.delete.key_name();
        let request = MutationRequest::new(
            shared
                .delete
                .query
                .clone()
                .with_variable(key_name, key.to_json()),
        )
        .refetching(shared.list.query.clone());

        let generation = shared.state.lock().begin();
        let result = call(
            shared.config.request_timeout,
            CallKind::Mutation,
            &request.mutation.operation,
            shared.access.mutate(&request),
        )
        .await;

        match result {
            Ok(payload) => {
                let echoed = shared
                    .delete
                    .extract(&payload)
                    .and_then(|v| v.get(key_name))
                    .and_then(RecordKey::from_json)
                    .filter(RecordKey::is_positive);
                let mut state = shared.state.lock();
                state.settle(generation);
                if let Some(id) = echoed.filter(|_| state.generation == generation) {
                    state
                        .rows
                        .retain(|row| !row.get(key_name).is_some_and(|v| id.matches(v)));
                }
                Some(payload)
            }
            Err(error) => {
                shared.state.lock().settle(generation);
                shared.sink.report(&error);
                None
            }
        }
    }

    /// Columns for the current schema, memoized by schema identity.
    #[must_use]
    pub fn columns(&self) -> Arc<[ColumnDescriptor]> {
        let schema = self.schema.lock().clone();
        self.projector.lock().project(&schema)
    }

    /// Swaps the schema; columns are re-projected on next access.
    pub fn set_schema(&self, schema: Schema) {
        *self.schema.lock() = schema;
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Record> {
        self.shared.state.lock().rows.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().is_loading()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        let state = self.shared.state.lock();
        ListSnapshot {
            rows: state.rows.clone(),
            loading: state.is_loading(),
            phase: state.phase(),
        }
    }

    /// Rows filtered and sorted by `view` through the current columns.
    #[must_use]
    pub fn view(&self, view: &ViewState) -> Vec<Record> {
        let columns = self.columns();
        let rows = self.rows();
        apply_view(&rows, &columns, view)
    }

    fn abort_watcher(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.get_mut().take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
