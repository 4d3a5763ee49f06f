//! The query state machine.
//!
//! Owns every query record of a hosting session and applies backend
//! notifications to them one at a time. `Running` may move to itself or to
//! any terminal state; terminal states only accept result store updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::events::{Notification, QueryEvent};
use super::spec::QuerySpec;
use super::types::{Query, QueryId, QueryState};
use crate::backend::ExecutionBackend;
use crate::error::{Result, SqlLabError};

/// Why a notification was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "state", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The query is not tracked (never submitted or already discarded).
    UnknownQuery,
    /// The query already reached this terminal state.
    AlreadyTerminal(QueryState),
    /// A result store update arrived for a query that has no results.
    NoResults(QueryState),
}

/// What applying a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The query's state changed (or a running query progressed).
    Applied { from: QueryState, to: QueryState },
    /// Results were replaced or released; the state did not change.
    StoreUpdated,
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl TransitionOutcome {
    /// Returns true if the query record changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StopOutcome {
    /// A cancellation was sent to the backend.
    Requested,
    /// A cancellation was already sent; nothing was sent again.
    AlreadyRequested,
    /// The query is not running; nothing was sent.
    NotRunning(QueryState),
}

/// State machine over all queries of one hosting session.
pub struct QueryLifecycle {
    backend: Arc<dyn ExecutionBackend>,
    queries: HashMap<QueryId, Query>,
    /// Submission order.
    order: Vec<QueryId>,
    stop_requested: HashSet<QueryId>,
    /// Queries whose session-timeout check already ran.
    timeout_checked: HashSet<QueryId>,
    session_timeout_marker: String,
}

impl QueryLifecycle {
    /// Creates an empty lifecycle that submits to `backend`.
    pub fn new(backend: Arc<dyn ExecutionBackend>, session_timeout_marker: impl Into<String>) -> Self {
        Self {
            backend,
            queries: HashMap::new(),
            order: Vec::new(),
            stop_requested: HashSet::new(),
            timeout_checked: HashSet::new(),
            session_timeout_marker: session_timeout_marker.into(),
        }
    }

    /// Submits a query and starts tracking it as running.
    ///
    /// If the backend refuses the submission no query is created.
    pub fn submit(&mut self, spec: QuerySpec) -> Result<&Query> {
        let id = QueryId::generate();
        self.backend.submit_query(&id, &spec)?;
        debug!(query = %id, ctas = spec.ctas, "Query submitted");
        Ok(self.track(Query::new(id, spec)))
    }

    fn track(&mut self, query: Query) -> &Query {
        let id = query.id.clone();
        self.order.push(id.clone());
        self.queries.entry(id).or_insert(query)
    }

    /// Returns the query with the given ID.
    pub fn get(&self, id: &QueryId) -> Option<&Query> {
        self.queries.get(id)
    }

    /// Returns all queries in submission order.
    pub fn queries(&self) -> impl Iterator<Item = &Query> {
        self.order.iter().filter_map(|id| self.queries.get(id))
    }

    /// Returns the number of tracked queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns true if no queries are tracked.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Applies one notification.
    pub fn apply(&mut self, notification: &Notification) -> TransitionOutcome {
        let Some(query) = self.queries.get_mut(&notification.query_id) else {
            warn!(
                query = %notification.query_id,
                event = notification.event.name(),
                "Notification for unknown query ignored"
            );
            return TransitionOutcome::Ignored(IgnoreReason::UnknownQuery);
        };

        let outcome = match notification.event.target_state() {
            Some(_) if query.state.is_terminal() => {
                TransitionOutcome::Ignored(IgnoreReason::AlreadyTerminal(query.state))
            }
            Some(to) => {
                let from = query.state;
                apply_transition(query, &notification.event);
                TransitionOutcome::Applied { from, to }
            }
            None if query.state != QueryState::Success => {
                TransitionOutcome::Ignored(IgnoreReason::NoResults(query.state))
            }
            None => {
                apply_store_update(query, &notification.event);
                TransitionOutcome::StoreUpdated
            }
        };

        match outcome {
            TransitionOutcome::Ignored(reason) => warn!(
                query = %notification.query_id,
                event = notification.event.name(),
                ?reason,
                "Notification ignored"
            ),
            _ => debug!(
                query = %notification.query_id,
                event = notification.event.name(),
                ?outcome,
                "Notification applied"
            ),
        }
        outcome
    }

    /// Asks the backend to cancel a running query.
    ///
    /// Only the first call for a query reaches the backend. The `Stopped`
    /// transition arrives later as a notification, if at all.
    pub fn request_stop(&mut self, id: &QueryId) -> Result<StopOutcome> {
        let query = self
            .queries
            .get(id)
            .ok_or_else(|| SqlLabError::UnknownQuery(id.clone()))?;

        if query.state != QueryState::Running {
            return Ok(StopOutcome::NotRunning(query.state));
        }
        if self.stop_requested.contains(id) {
            return Ok(StopOutcome::AlreadyRequested);
        }

        self.backend.cancel_query(id)?;
        self.stop_requested.insert(id.clone());
        debug!(query = %id, "Stop requested");
        Ok(StopOutcome::Requested)
    }

    /// Returns true once a stop was sent for this query.
    pub fn stop_requested(&self, id: &QueryId) -> bool {
        self.stop_requested.contains(id)
    }

    /// Runs the one-time session-timeout check for a failed query.
    ///
    /// If the query failed with a message containing the session-timeout
    /// marker, the same submission is sent again as a new query, whose ID is
    /// returned. The check is spent once it has decided, so later calls
    /// return `None`; a refused resubmission leaves it pending. Queries that
    /// have not failed are left unchecked. A query that is itself such a
    /// retry is never retried.
    pub fn on_session_timeout_detected(&mut self, id: &QueryId) -> Result<Option<QueryId>> {
        let query = self
            .queries
            .get(id)
            .ok_or_else(|| SqlLabError::UnknownQuery(id.clone()))?;

        if query.state != QueryState::Failed || self.timeout_checked.contains(id) {
            return Ok(None);
        }

        let timed_out = query.resubmitted_from.is_none()
            && query
                .error_message
                .as_deref()
                .is_some_and(|msg| msg.contains(self.session_timeout_marker.as_str()));
        if !timed_out {
            self.timeout_checked.insert(id.clone());
            return Ok(None);
        }

        let spec = query.spec.clone();
        let retry_id = QueryId::generate();
        self.backend.submit_query(&retry_id, &spec)?;
        self.timeout_checked.insert(id.clone());
        info!(query = %id, retry = %retry_id, "Session timed out, resubmitting query");

        let mut retry = Query::new(retry_id.clone(), spec);
        retry.resubmitted_from = Some(id.clone());
        // The retry's own check must not fire again
        self.timeout_checked.insert(retry_id.clone());
        self.track(retry);
        Ok(Some(retry_id))
    }

    /// Stops tracking a query and returns its record.
    pub fn remove(&mut self, id: &QueryId) -> Option<Query> {
        self.order.retain(|q| q != id);
        self.stop_requested.remove(id);
        self.timeout_checked.remove(id);
        self.queries.remove(id)
    }
}

fn apply_transition(query: &mut Query, event: &QueryEvent) {
    match event {
        QueryEvent::Progress {
            progress,
            tracking_url,
        } => {
            query.progress = (*progress).min(100);
            if tracking_url.is_some() {
                query.tracking_url = tracking_url.clone();
            }
        }
        QueryEvent::Succeeded {
            results_key,
            results,
            temp_table,
            ctas,
            limit_reached,
            rows,
        } => {
            query.state = QueryState::Success;
            query.progress = 100;
            query.tracking_url = None;
            query.results_key = results_key.clone();
            query.results = results.clone();
            query.temp_table = temp_table.clone();
            query.ctas = *ctas || query.ctas;
            query.limit_reached = *limit_reached;
            query.rows = rows.or_else(|| results.as_ref().map(|r| r.row_count()));
            query.ended_at = Some(SystemTime::now());
        }
        QueryEvent::Failed { error_message } => {
            query.state = QueryState::Failed;
            query.tracking_url = None;
            query.error_message = error_message.clone();
            query.ended_at = Some(SystemTime::now());
        }
        QueryEvent::Stopped => {
            query.state = QueryState::Stopped;
            query.tracking_url = None;
            query.ended_at = Some(SystemTime::now());
        }
        QueryEvent::ResultsFetched { .. } | QueryEvent::ResultsReleased => {}
    }
}

fn apply_store_update(query: &mut Query, event: &QueryEvent) {
    match event {
        QueryEvent::ResultsFetched {
            results_key,
            results,
        } => {
            if results_key.is_some() {
                query.results_key = results_key.clone();
            }
            query.rows = Some(results.row_count());
            query.results = Some(results.clone());
            query.cached = false;
        }
        QueryEvent::ResultsReleased => {
            query.results = None;
            query.cached = true;
        }
        _ => {}
    }
}
