//! Notifications pushed in by the execution backend and result store, and
//! the effects the core asks its collaborators to carry out.

use serde::{Deserialize, Serialize};

use super::types::{QueryId, QueryResults, QueryState};

/// A single notification about one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub query_id: QueryId,
    pub event: QueryEvent,
}

impl Notification {
    /// Creates a notification for `query_id`.
    pub fn new(query_id: QueryId, event: QueryEvent) -> Self {
        Self { query_id, event }
    }
}

/// What happened to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEvent {
    /// The query is still running.
    Progress {
        #[serde(default)]
        progress: u8,
        #[serde(default)]
        tracking_url: Option<String>,
    },
    /// The query finished and produced rows or a table.
    Succeeded {
        #[serde(default)]
        results_key: Option<String>,
        #[serde(default)]
        results: Option<QueryResults>,
        #[serde(default)]
        temp_table: Option<String>,
        #[serde(default)]
        ctas: bool,
        #[serde(default)]
        limit_reached: bool,
        #[serde(default)]
        rows: Option<usize>,
    },
    /// The backend reported a failure.
    Failed {
        #[serde(default)]
        error_message: Option<String>,
    },
    /// The backend confirmed cancellation.
    Stopped,
    /// The result store (re)materialized results for a finished query.
    ResultsFetched {
        #[serde(default)]
        results_key: Option<String>,
        results: QueryResults,
    },
    /// The result store dropped its live copy of the results.
    ResultsReleased,
}

impl QueryEvent {
    /// Progress update without a tracking link.
    pub fn progress(progress: u8) -> Self {
        Self::Progress {
            progress,
            tracking_url: None,
        }
    }

    /// Row-producing success.
    pub fn succeeded(results_key: impl Into<String>, results: QueryResults) -> Self {
        Self::Succeeded {
            results_key: Some(results_key.into()),
            rows: Some(results.row_count()),
            results: Some(results),
            temp_table: None,
            ctas: false,
            limit_reached: false,
        }
    }

    /// Create-table-as success.
    pub fn created_table(temp_table: impl Into<String>) -> Self {
        Self::Succeeded {
            results_key: None,
            results: None,
            temp_table: Some(temp_table.into()),
            ctas: true,
            limit_reached: false,
            rows: None,
        }
    }

    /// Failure with a message.
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_message: Some(error_message.into()),
        }
    }

    /// Returns the state this event moves a running query into, if any.
    pub fn target_state(&self) -> Option<QueryState> {
        match self {
            Self::Progress { .. } => Some(QueryState::Running),
            Self::Succeeded { .. } => Some(QueryState::Success),
            Self::Failed { .. } => Some(QueryState::Failed),
            Self::Stopped => Some(QueryState::Stopped),
            Self::ResultsFetched { .. } | Self::ResultsReleased => None,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Stopped => "stopped",
            Self::ResultsFetched { .. } => "results_fetched",
            Self::ResultsReleased => "results_released",
        }
    }
}

/// A side effect requested by the core and executed by the hosting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Pull newly available results from the result store.
    FetchResults {
        query_id: QueryId,
        results_key: String,
    },
    /// Explicitly re-materialize results the store already released.
    RefetchResults {
        query_id: QueryId,
        results_key: Option<String>,
    },
    /// Tell the store it may drop its live copy of the results.
    ReleaseResults { query_id: QueryId },
}
