//! The hosting session: editor tabs, their queries, and the glue between
//! the lifecycle, the result cache and the presenter.
//!
//! Everything here runs on one thread; [`actor`] runs a session on its own
//! task and feeds it commands one at a time.

pub mod actor;

pub use actor::{spawn, SessionCommand, SessionHandle};

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{ExecutionBackend, ResultStore};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::editor::{DatabaseInfo, EditorTemplate, QueryEditor};
use crate::error::{Result, SqlLabError};
use crate::history::{filter_history, HistoryFilter, HistoryRow};
use crate::presenter::{present, Action, Presentation, PresenterOptions, ResultObserver};
use crate::query::{
    Effect, Notification, Query, QueryEvent, QueryId, QueryLifecycle, QueryState, StopOutcome,
    TransitionOutcome,
};

/// What performing an [`Action`] led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Stop(StopOutcome),
    RefetchRequested,
    /// A new editor tab was opened; carries its ID and, if it ran, its query.
    EditorOpened {
        editor_id: String,
        query_id: Option<QueryId>,
    },
    /// The action is carried out by the view (links, clipboard, search).
    Delegated,
}

/// One user's SQL Lab session.
pub struct Session {
    lifecycle: QueryLifecycle,
    cache: ResultCache,
    observer: ResultObserver,
    options: PresenterOptions,
    store: Arc<dyn ResultStore>,
    /// Open tabs in display order.
    editors: Vec<QueryEditor>,
    databases: HashMap<i64, DatabaseInfo>,
}

impl Session {
    /// Creates a session from configuration and its collaborators.
    pub fn new(
        config: &Config,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self> {
        Ok(Self {
            lifecycle: QueryLifecycle::new(backend, config.lifecycle.session_timeout_marker.clone()),
            cache: ResultCache::new(config.results.cache),
            observer: ResultObserver::new(),
            options: PresenterOptions::from_config(config)?,
            store,
            editors: Vec::new(),
            databases: HashMap::new(),
        })
    }

    /// Registers a database editors can target.
    pub fn add_database(&mut self, database: DatabaseInfo) {
        self.databases.insert(database.id, database);
    }

    /// Returns the query with the given ID.
    pub fn query(&self, id: &QueryId) -> Option<&Query> {
        self.lifecycle.get(id)
    }

    /// Returns the result cache.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Returns the open editors in display order.
    pub fn editors(&self) -> &[QueryEditor] {
        &self.editors
    }

    /// Returns an open editor.
    pub fn editor(&self, editor_id: &str) -> Option<&QueryEditor> {
        self.editors.iter().find(|e| e.id == editor_id)
    }

    /// Returns an open editor for modification.
    pub fn editor_mut(&mut self, editor_id: &str) -> Result<&mut QueryEditor> {
        self.editors
            .iter_mut()
            .find(|e| e.id == editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))
    }

    /// Returns the latest query submitted from an editor.
    pub fn latest_query(&self, editor_id: &str) -> Option<&Query> {
        self.editor(editor_id)?
            .latest_query_id
            .as_ref()
            .and_then(|id| self.lifecycle.get(id))
    }

    /// Opens an editor tab. An autorun editor runs once right away and its
    /// autorun flag is cleared.
    pub fn open_editor(&mut self, mut editor: QueryEditor) -> Result<Option<QueryId>> {
        let autorun = std::mem::take(&mut editor.autorun);
        let editor_id = editor.id.clone();
        debug!(editor = %editor_id, autorun, "Opening editor");
        self.editors.push(editor);

        if autorun {
            self.start_query(&editor_id, false, false).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Opens a new tab from a template.
    pub fn open_template(&mut self, template: &EditorTemplate) -> Result<(String, Option<QueryId>)> {
        let editor = QueryEditor::from_template(template);
        let editor_id = editor.id.clone();
        let query_id = self.open_editor(editor)?;
        Ok((editor_id, query_id))
    }

    /// Runs an editor's SQL. Does nothing when the editor has no SQL.
    ///
    /// Runs are forced async when the database does not allow synchronous
    /// execution.
    pub fn run_editor(&mut self, editor_id: &str, run_async: bool) -> Result<Option<QueryId>> {
        let editor = self
            .editor(editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?;
        if editor.sql.trim().is_empty() {
            debug!(editor = %editor_id, "Nothing to run");
            return Ok(None);
        }

        let allow_run_sync = editor
            .db_id
            .and_then(|id| self.databases.get(&id))
            .is_some_and(|db| db.allow_run_sync);
        let run_async = run_async || !allow_run_sync;
        self.start_query(editor_id, run_async, false).map(Some)
    }

    /// Runs an editor's SQL as create-table-as into its CTAS table name.
    pub fn create_table_as(&mut self, editor_id: &str) -> Result<Option<QueryId>> {
        let editor = self
            .editor(editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?;
        if editor.ctas_name.trim().is_empty() {
            debug!(editor = %editor_id, "No CTAS table name");
            return Ok(None);
        }
        if let Some(db) = editor.db_id.and_then(|id| self.databases.get(&id)) {
            if !db.allow_ctas {
                warn!(editor = %editor_id, database = %db.name, "Database does not allow CTAS");
                return Ok(None);
            }
        }
        self.start_query(editor_id, true, true).map(Some)
    }

    fn start_query(&mut self, editor_id: &str, run_async: bool, ctas: bool) -> Result<QueryId> {
        let spec = self
            .editor(editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?
            .to_spec(run_async, ctas);
        let query_id = self.lifecycle.submit(spec)?.id.clone();
        self.editor_mut(editor_id)?.latest_query_id = Some(query_id.clone());
        Ok(query_id)
    }

    /// Stops the latest query of an editor, if it has one.
    pub fn stop_editor(&mut self, editor_id: &str) -> Result<Option<StopOutcome>> {
        let latest = self
            .editor(editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?
            .latest_query_id
            .clone();
        latest.map(|id| self.lifecycle.request_stop(&id)).transpose()
    }

    /// Stops a query.
    pub fn request_stop(&mut self, query_id: &QueryId) -> Result<StopOutcome> {
        self.lifecycle.request_stop(query_id)
    }

    /// Applies a backend or result store notification.
    pub fn handle(&mut self, notification: &Notification) -> TransitionOutcome {
        self.lifecycle.apply(notification)
    }

    /// Renders a query's result pane.
    ///
    /// A failed query whose session timed out is resubmitted once and the
    /// retry is rendered in its place. A changed results key triggers a
    /// fetch, and fresh rows are captured into the cache so the store can
    /// release them.
    pub fn observe(&mut self, query_id: &QueryId) -> Result<Presentation> {
        let query = self
            .lifecycle
            .get(query_id)
            .ok_or_else(|| SqlLabError::UnknownQuery(query_id.clone()))?;

        if query.state == QueryState::Failed {
            if let Some(retry_id) = self.lifecycle.on_session_timeout_detected(query_id)? {
                self.replace_latest(query_id, &retry_id);
                return self.observe(&retry_id);
            }
        }

        let query = self
            .lifecycle
            .get(query_id)
            .ok_or_else(|| SqlLabError::UnknownQuery(query_id.clone()))?;
        for effect in self.observer.observe(query) {
            self.execute(effect)?;
        }

        let query = self
            .lifecycle
            .get(query_id)
            .ok_or_else(|| SqlLabError::UnknownQuery(query_id.clone()))?;
        if self.cache.capture(query).holds_rows() && !query.cached {
            self.execute(Effect::ReleaseResults {
                query_id: query_id.clone(),
            })?;
        }

        let query = self
            .lifecycle
            .get(query_id)
            .ok_or_else(|| SqlLabError::UnknownQuery(query_id.clone()))?;
        Ok(present(query, &self.options, &self.cache))
    }

    /// Renders the result pane of an editor's latest query.
    pub fn observe_editor(&mut self, editor_id: &str) -> Result<Option<Presentation>> {
        let latest = self
            .editor(editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?
            .latest_query_id
            .clone();
        latest.map(|id| self.observe(&id)).transpose()
    }

    fn replace_latest(&mut self, old: &QueryId, new: &QueryId) {
        for editor in &mut self.editors {
            if editor.latest_query_id.as_ref() == Some(old) {
                editor.latest_query_id = Some(new.clone());
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Result<()> {
        debug!(?effect, "Executing effect");
        match effect {
            Effect::FetchResults {
                query_id,
                results_key,
            } => self.store.fetch_results(&query_id, &results_key),
            Effect::RefetchResults {
                query_id,
                results_key,
            } => self
                .store
                .refetch_results(&query_id, results_key.as_deref()),
            Effect::ReleaseResults { query_id } => {
                self.lifecycle
                    .apply(&Notification::new(query_id, QueryEvent::ResultsReleased));
                Ok(())
            }
        }
    }

    /// Asks the result store to materialize a released result set again.
    pub fn refetch(&mut self, query_id: &QueryId) -> Result<()> {
        let results_key = self
            .lifecycle
            .get(query_id)
            .ok_or_else(|| SqlLabError::UnknownQuery(query_id.clone()))?
            .results_key
            .clone();
        self.execute(Effect::RefetchResults {
            query_id: query_id.clone(),
            results_key,
        })
    }

    /// Carries out an action from a presentation.
    pub fn perform(&mut self, action: &Action) -> Result<ActionOutcome> {
        match action {
            Action::Stop { query_id } => self.request_stop(query_id).map(ActionOutcome::Stop),
            Action::RefetchResults { query_id, .. } => {
                self.refetch(query_id)?;
                Ok(ActionOutcome::RefetchRequested)
            }
            Action::OpenInNewTab { template } => {
                let (editor_id, query_id) = self.open_template(template)?;
                Ok(ActionOutcome::EditorOpened {
                    editor_id,
                    query_id,
                })
            }
            Action::TrackJob { .. }
            | Action::Visualize { .. }
            | Action::ExportCsv { .. }
            | Action::ExportXlsx { .. }
            | Action::CopyToClipboard
            | Action::Search => Ok(ActionOutcome::Delegated),
        }
    }

    /// Discards a query along with its cached rows.
    pub fn discard(&mut self, query_id: &QueryId) -> bool {
        self.cache.invalidate(query_id);
        self.observer.forget(query_id);
        for editor in &mut self.editors {
            if editor.latest_query_id.as_ref() == Some(query_id) {
                editor.latest_query_id = None;
            }
        }
        let removed = self.lifecycle.remove(query_id).is_some();
        if removed {
            debug!(query = %query_id, "Discarded query");
        }
        removed
    }

    /// Closes an editor tab and discards every query it submitted.
    pub fn close_editor(&mut self, editor_id: &str) -> Result<usize> {
        let position = self
            .editors
            .iter()
            .position(|e| e.id == editor_id)
            .ok_or_else(|| SqlLabError::unknown_editor(editor_id))?;
        self.editors.remove(position);

        let owned: Vec<QueryId> = self
            .lifecycle
            .queries()
            .filter(|q| q.spec.sql_editor_id.as_deref() == Some(editor_id))
            .map(|q| q.id.clone())
            .collect();
        for id in &owned {
            self.discard(id);
        }
        info!(editor = %editor_id, discarded = owned.len(), "Closed editor");
        Ok(owned.len())
    }

    /// Lists submitted queries matching `filter`, oldest first.
    pub fn history(&self, filter: &HistoryFilter) -> Vec<HistoryRow> {
        filter_history(self.lifecycle.queries(), filter)
    }
}
