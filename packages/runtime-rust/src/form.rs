//! Form controller: a single-record create/update session.
//!
//! [`FormController::open`] fully re-initializes the session: remote option
//! sets and (in update mode) the target record are read concurrently, then
//! values, dependency patches, and options are committed in one step. Each
//! run takes a new generation and only the latest run may commit.

use std::sync::Arc;

use crudkit_core::dependency;
use crudkit_core::session::{form_fields, values_of};
use crudkit_core::validation::validate;
use crudkit_core::{
    FieldPatch, FormField, FormMode, OptionMap, QueryDescriptor, Record, RecordKey,
    ValidationResult,
};
use futures_util::future::try_join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ControllerConfig, CrudConfig};
use crate::error::CrudError;
use crate::remote::{call, CallKind};
use crate::traits::{DataAccess, ErrorSink, MutationRequest};

/// Session lifecycle: `Initializing -> Ready <-> Submitting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Initializing,
    Ready,
    Submitting,
}

/// Point-in-time copy of the session.
#[derive(Debug, Clone)]
pub struct FormSnapshot {
    pub mode: FormMode,
    pub phase: FormPhase,
    pub fields: Vec<FormField>,
}

impl FormSnapshot {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase != FormPhase::Ready
    }
}

#[derive(Debug)]
struct Session {
    mode: FormMode,
    initializing: bool,
    /// Mutations in flight; a submit may overlap an initialization.
    submitting: usize,
    fields: Vec<FormField>,
    generation: u64,
}

impl Session {
    /// An initialization in flight outranks a pending submit.
    fn phase(&self) -> FormPhase {
        if self.initializing {
            FormPhase::Initializing
        } else if self.submitting > 0 {
            FormPhase::Submitting
        } else {
            FormPhase::Ready
        }
    }
}

/// Binds a schema plus read/write sources to one edit session at a time.
pub struct FormController {
    crud: CrudConfig,
    access: Arc<dyn DataAccess>,
    sink: Arc<dyn ErrorSink>,
    config: ControllerConfig,
    session: Mutex<Session>,
}

impl FormController {
    /// Creates a controller holding the pre-initialization field list.
    #[must_use]
    pub fn new(
        crud: &CrudConfig,
        access: Arc<dyn DataAccess>,
        sink: Arc<dyn ErrorSink>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            session: Mutex::new(Session {
                mode: FormMode::Create,
                initializing: false,
                submitting: 0,
                fields: form_fields(&crud.schema),
                generation: 0,
            }),
            crud: crud.clone(),
            access,
            sink,
            config,
        }
    }

    /// Starts a session for `key` and waits for its initialization.
    ///
    /// An absent or falsy key opens a create session. A failed or
    /// superseded run leaves the committed fields untouched.
    pub async fn open(&self, key: Option<RecordKey>) {
        let mode = FormMode::from_key(key);
        let generation = {
            let mut session = self.session.lock();
            session.generation += 1;
            session.mode = mode.clone();
            session.initializing = true;
            session.generation
        };
        debug!(%mode, generation, "initializing form");

        let mut fields = form_fields(&self.crud.schema);
        let remote: Vec<(usize, _)> = fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let source = f.field.config_options.as_ref()?;
                source.query.as_ref().map(|query| (i, query.clone()))
            })
            .collect();

        let option_reads = try_join_all(remote.iter().map(|(_, query)| {
            call(
                self.config.request_timeout,
                CallKind::Query,
                &query.operation,
                self.access.query(query),
            )
        }));
        let record_read = async {
            match mode.key() {
                Some(key) => self.read_record(key).await,
                None => Ok(None),
            }
        };

        match tokio::try_join!(option_reads, record_read) {
            Ok((responses, record)) => {
                let mut options: Vec<OptionMap> =
                    fields.iter().map(|f| f.field.options.clone()).collect();
                for ((index, _), payload) in remote.iter().zip(&responses) {
                    options[*index] = fields[*index]
                        .field
                        .config_options
                        .as_ref()
                        .map(|source| source.resolve(payload))
                        .unwrap_or_default();
                }
                if let Some(record) = &record {
                    seed(&mut fields, record);
                }
                // Resolved options override whatever a dependency patch set.
                for (field, options) in fields.iter_mut().zip(options) {
                    field.apply(FieldPatch::options(options));
                }
                let mut session = self.session.lock();
                if session.generation != generation {
                    warn!(generation, latest = session.generation, "discarding stale form init");
                    return;
                }
                session.fields = fields;
                session.initializing = false;
            }
            Err(error) => {
                {
                    let mut session = self.session.lock();
                    if session.generation == generation {
                        session.initializing = false;
                    }
                }
                self.sink.report(&error);
            }
        }
    }

    /// Re-gates dependent fields on `changed` and takes every value from `all`.
    pub fn on_values_changed(&self, changed: &Record, all: &Record) {
        let changed_keys: Vec<&String> = changed.keys().collect();
        let mut session = self.session.lock();
        for field in &mut session.fields {
            if let Some(patch) = dependency::resolve(&field.field, all, &changed_keys) {
                debug!(field = %field.field.key, "dependency gate opened");
                field.apply(patch);
            }
            let raw = all.get(&field.field.key);
            field.set_raw(raw);
        }
    }

    /// Validates and upserts `values`; returns the mutation payload.
    ///
    /// The identifier is sent as `null` in create mode. The list query is
    /// always refetched, the record itself only when its key is positive.
    /// Invalid values and failed mutations are reported and yield `None`.
    pub async fn submit(&self, values: Record) -> Option<Value> {
        let (mode, verdict) = {
            let session = self.session.lock();
            (session.mode.clone(), validate(&session.fields, &values))
        };
        if let ValidationResult::Invalid { errors } = verdict {
            self.sink.report(&CrudError::Invalid(errors));
            return None;
        }

        let post = &self.crud.post;
        let mut variables = values;
        variables.insert(
            post.key_name().to_string(),
            mode.key().map_or(Value::Null, RecordKey::to_json),
        );
        let mut request = MutationRequest::new(post.query.clone().with_variables(variables))
            .refetching(self.crud.get_list.query.clone());
        if let Some(key) = mode.key().filter(|k| k.is_positive()) {
            request = request.refetching(self.point_query(key));
        }

        self.session.lock().submitting += 1;
        let result = call(
            self.config.request_timeout,
            CallKind::Mutation,
            &request.mutation.operation,
            self.access.mutate(&request),
        )
        .await;
        {
            let mut session = self.session.lock();
            session.submitting = session.submitting.saturating_sub(1);
        }

        match result {
            Ok(payload) => {
                debug!(%mode, "form submitted");
                Some(payload)
            }
            Err(error) => {
                self.sink.report(&error);
                None
            }
        }
    }

    #[must_use]
    pub fn fields(&self) -> Vec<FormField> {
        self.session.lock().fields.clone()
    }

    #[must_use]
    pub fn mode(&self) -> FormMode {
        self.session.lock().mode.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.session.lock().phase() != FormPhase::Ready
    }

    /// Current values in stored form, keyed by field.
    #[must_use]
    pub fn current_values(&self) -> Record {
        values_of(&self.session.lock().fields)
    }

    #[must_use]
    pub fn snapshot(&self) -> FormSnapshot {
        let session = self.session.lock();
        FormSnapshot {
            mode: session.mode.clone(),
            phase: session.phase(),
            fields: session.fields.clone(),
        }
    }

    fn point_query(&self, key: &RecordKey) -> QueryDescriptor {
        let source = &self.crud.get_by_key;
        source
            .query
            .clone()
            .with_variable(source.key_name(), key.to_json())
    }

    /// Reads the target record; a payload without it yields `None`.
    async fn read_record(&self, key: &RecordKey) -> Result<Option<Record>, CrudError> {
        let query = self.point_query(key);
        let payload = call(
            self.config.request_timeout,
            CallKind::Query,
            &query.operation,
            self.access.query(&query),
        )
        .await?;
        Ok(self
            .crud
            .get_by_key
            .extract(&payload)
            .and_then(Value::as_object)
            .cloned())
    }
}

/// Seeds values from `record` and gates dependencies on its keys.
fn seed(fields: &mut [FormField], record: &Record) {
    let record_keys: Vec<&String> = record.keys().collect();
    for field in fields.iter_mut() {
        let Some(raw) = record.get(&field.field.key).filter(|v| !v.is_null()) else {
            continue;
        };
        field.set_raw(Some(raw));
        if let Some(patch) = dependency::resolve(&field.field, record, &record_keys) {
            field.apply(patch);
        }
    }
}
