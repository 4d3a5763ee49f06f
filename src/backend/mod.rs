//! Collaborator interfaces consumed by the core.
//!
//! Every call is fire-and-forget: its effect arrives later as a
//! [`Notification`](crate::query::Notification). An `Err` means the request
//! itself could not be sent.

mod recording;

pub use recording::{BackendCall, RecordingBackend, RecordingStore, StoreCall};

use crate::error::Result;
use crate::query::{QueryId, QuerySpec};

/// The remote query engine.
pub trait ExecutionBackend: Send + Sync {
    /// Submits `spec` under the client-assigned `query_id`.
    fn submit_query(&self, query_id: &QueryId, spec: &QuerySpec) -> Result<()>;

    /// Asks the engine to cancel a running query.
    fn cancel_query(&self, query_id: &QueryId) -> Result<()>;
}

/// The authoritative holder of live result sets.
pub trait ResultStore: Send + Sync {
    /// Pulls the result set identified by `results_key`.
    fn fetch_results(&self, query_id: &QueryId, results_key: &str) -> Result<()>;

    /// Re-materializes results the store already released.
    fn refetch_results(&self, query_id: &QueryId, results_key: Option<&str>) -> Result<()>;
}
