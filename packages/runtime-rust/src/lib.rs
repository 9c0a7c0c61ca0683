//! `CrudKit` Runtime: list and form controllers over an async data-access layer.

pub mod config;
pub mod error;
pub mod form;
pub mod list;
pub mod memory;
pub mod observe;
mod remote;
pub mod traits;

pub use config::{ControllerConfig, CrudConfig};
pub use error::CrudError;
pub use form::{FormController, FormPhase, FormSnapshot};
pub use list::{ListController, ListPhase, ListSnapshot};
pub use memory::MemoryDataAccess;
pub use observe::{init_tracing, CollectingSink, CompositeSink, TracingSink};
pub use traits::{DataAccess, ErrorSink, MutationRequest, Subscription};
