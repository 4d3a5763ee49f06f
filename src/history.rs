//! Query history for the hosting session.
//!
//! Lists the queries a session submitted, optionally narrowed by dialect,
//! exact SQL text and state.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::query::{Query, QueryId, QueryState, SqlType};

/// Filter options for the history list. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    #[serde(default)]
    pub sql_type: Option<SqlType>,
    /// Matches the submitted SQL exactly.
    #[serde(default)]
    pub sql_text: Option<String>,
    #[serde(default)]
    pub state: Option<QueryState>,
}

impl HistoryFilter {
    /// Returns true if no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.sql_type.is_none()
            && self.sql_text.as_deref().map_or(true, str::is_empty)
            && self.state.is_none()
    }

    /// Returns true if `query` satisfies every set criterion.
    pub fn matches(&self, query: &Query) -> bool {
        if self.sql_type.is_some_and(|t| t != query.spec.sql_type) {
            return false;
        }
        if let Some(text) = self.sql_text.as_deref().filter(|t| !t.is_empty()) {
            if query.sql() != text {
                return false;
            }
        }
        self.state.map_or(true, |s| s == query.state)
    }
}

/// One row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub query_id: QueryId,
    pub state: QueryState,
    pub started: SystemTime,
    pub duration: Option<Duration>,
    pub progress: u8,
    pub rows: Option<usize>,
    pub sql: String,
    pub sql_type: SqlType,
    /// Table a create-table-as query wrote to.
    pub output: Option<String>,
}

impl From<&Query> for HistoryRow {
    fn from(query: &Query) -> Self {
        Self {
            query_id: query.id.clone(),
            state: query.state,
            started: query.started_at,
            duration: query.duration(),
            progress: query.progress,
            rows: query.rows,
            sql: query.sql().to_string(),
            sql_type: query.spec.sql_type,
            output: if query.ctas {
                query
                    .temp_table
                    .clone()
                    .or_else(|| query.spec.temp_table_name.clone())
            } else {
                None
            },
        }
    }
}

/// Builds history rows for the queries matching `filter`, in input order.
pub fn filter_history<'a>(
    queries: impl IntoIterator<Item = &'a Query>,
    filter: &HistoryFilter,
) -> Vec<HistoryRow> {
    queries
        .into_iter()
        .filter(|q| filter.is_empty() || filter.matches(q))
        .map(HistoryRow::from)
        .collect()
}
