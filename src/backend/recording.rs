//! Recording collaborators for headless runs and tests.
//!
//! They accept every request, log it, and keep a transcript that callers can
//! inspect. Nothing is executed; notifications have to be fed back by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::info;

use super::{ExecutionBackend, ResultStore};
use crate::error::{Result, SqlLabError};
use crate::query::{QueryId, QuerySpec};

/// A call received by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Submit { query_id: QueryId, spec: QuerySpec },
    Cancel { query_id: QueryId },
}

/// Execution backend that records submissions and cancellations.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    refuse: AtomicBool,
}

impl RecordingBackend {
    /// Creates a backend that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that refuses every call, like an unreachable server.
    pub fn refusing() -> Self {
        let backend = Self::default();
        backend.set_refusing(true);
        backend
    }

    /// Toggles whether calls are refused.
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Returns every recorded call in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().clone()
    }

    /// Returns the IDs of submitted queries in order.
    pub fn submissions(&self) -> Vec<QueryId> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Submit { query_id, .. } => Some(query_id.clone()),
                BackendCall::Cancel { .. } => None,
            })
            .collect()
    }

    /// Returns how many cancellations were requested for `query_id`.
    pub fn cancellations(&self, query_id: &QueryId) -> usize {
        self.lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Cancel { query_id: id } if id == query_id))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BackendCall>> {
        // A poisoned transcript is still a valid transcript
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SqlLabError::backend("execution backend unavailable"));
        }
        Ok(())
    }
}

impl ExecutionBackend for RecordingBackend {
    fn submit_query(&self, query_id: &QueryId, spec: &QuerySpec) -> Result<()> {
        self.check()?;
        info!(query = %query_id, sql = %spec.sql, run_async = spec.run_async, "Submitting query");
        self.lock().push(BackendCall::Submit {
            query_id: query_id.clone(),
            spec: spec.clone(),
        });
        Ok(())
    }

    fn cancel_query(&self, query_id: &QueryId) -> Result<()> {
        self.check()?;
        info!(query = %query_id, "Cancelling query");
        self.lock().push(BackendCall::Cancel {
            query_id: query_id.clone(),
        });
        Ok(())
    }
}

/// A call received by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch {
        query_id: QueryId,
        results_key: String,
    },
    Refetch {
        query_id: QueryId,
        results_key: Option<String>,
    },
}

/// Result store that records fetch requests.
#[derive(Debug, Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded call in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoreCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResultStore for RecordingStore {
    fn fetch_results(&self, query_id: &QueryId, results_key: &str) -> Result<()> {
        info!(query = %query_id, results_key, "Fetching results");
        self.lock().push(StoreCall::Fetch {
            query_id: query_id.clone(),
            results_key: results_key.to_string(),
        });
        Ok(())
    }

    fn refetch_results(&self, query_id: &QueryId, results_key: Option<&str>) -> Result<()> {
        if results_key.is_none() {
            return Err(SqlLabError::store(format!(
                "no results key to refetch for {query_id}"
            )));
        }
        info!(query = %query_id, results_key = ?results_key, "Re-fetching results");
        self.lock().push(StoreCall::Refetch {
            query_id: query_id.clone(),
            results_key: results_key.map(str::to_string),
        });
        Ok(())
    }
}
