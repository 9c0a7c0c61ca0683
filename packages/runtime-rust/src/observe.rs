//! Error sinks and tracing setup.
//!
//! [`TracingSink`] is the default observability collaborator: every caught
//! error becomes an `error!` event. [`CompositeSink`] fans a report out to
//! several sinks, e.g. tracing plus an application-level toast queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::error::CrudError;
use crate::traits::ErrorSink;

/// Logs every reported error through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &CrudError) {
        tracing::error!(
            operation = error.operation().unwrap_or("-"),
            error = %error,
            "crud operation failed"
        );
    }
}

/// Sink that forwards each report to every registered sink.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn ErrorSink>>,
}

impl CompositeSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ErrorSink>>) -> Self {
        Self { sinks }
    }

    /// Adds a sink after construction.
    pub fn add(&mut self, sink: Arc<dyn ErrorSink>) {
        self.sinks.push(sink);
    }
}

impl ErrorSink for CompositeSink {
    fn report(&self, error: &CrudError) {
        for sink in &self.sinks {
            sink.report(error);
        }
    }
}

/// Keeps the display form of every report, e.g. for a UI notification area.
#[derive(Debug, Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<String>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    /// Removes and returns every report received so far.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.seen.lock())
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, error: &CrudError) {
        self.seen.lock().push(error.to_string());
    }
}

/// Installs a global fmt subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Returns `false` when a global subscriber was already installed.
#[must_use]
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
