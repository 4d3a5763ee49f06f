//! Scripted sessions for headless runs and tests.
//!
//! A script is a JSON array of steps, e.g.
//!
//! ```json
//! [
//!   {"step": "open_editor", "id": "e1", "title": "Untitled", "sql": "SELECT 1"},
//!   {"step": "run", "editor": "e1"},
//!   {"step": "notify", "editor": "e1", "event": {"type": "progress", "progress": 40}},
//!   {"step": "observe", "editor": "e1"}
//! ]
//! ```
//!
//! Steps that act on a query target the editor's latest query unless a
//! `query` is named.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::editor::{DatabaseInfo, QueryEditor};
use crate::error::{Result, SqlLabError};
use crate::history::{HistoryFilter, HistoryRow};
use crate::presenter::{Action, Presentation, View};
use crate::query::{Notification, QueryEvent, QueryId, StopOutcome, TransitionOutcome};
use crate::session::{ActionOutcome, SessionHandle};

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Registers a database.
    Database(DatabaseInfo),
    OpenEditor(QueryEditor),
    /// Edits the SQL of an open editor.
    SetSql { editor: String, sql: String },
    Run {
        editor: String,
        #[serde(default)]
        run_async: bool,
    },
    /// Create-table-as, optionally naming the table first.
    Ctas {
        editor: String,
        #[serde(default)]
        table: Option<String>,
    },
    Stop { editor: String },
    /// Delivers a backend or result store event.
    Notify {
        editor: String,
        #[serde(default)]
        query: Option<QueryId>,
        event: QueryEvent,
    },
    Observe { editor: String },
    /// Performs the first action of the given name from the current view.
    Act { editor: String, action: String },
    Refetch { editor: String },
    Discard {
        editor: String,
        #[serde(default)]
        query: Option<QueryId>,
    },
    Close { editor: String },
    History(HistoryFilter),
}

impl ScriptStep {
    /// Returns the step's tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::OpenEditor(_) => "open_editor",
            Self::SetSql { .. } => "set_sql",
            Self::Run { .. } => "run",
            Self::Ctas { .. } => "ctas",
            Self::Stop { .. } => "stop",
            Self::Notify { .. } => "notify",
            Self::Observe { .. } => "observe",
            Self::Act { .. } => "act",
            Self::Refetch { .. } => "refetch",
            Self::Discard { .. } => "discard",
            Self::Close { .. } => "close",
            Self::History(_) => "history",
        }
    }
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Done,
    /// A run was requested; `query_id` is `None` if nothing was submitted.
    Submitted { query_id: Option<QueryId> },
    Stopped { outcome: Option<StopOutcome> },
    Notified {
        query_id: QueryId,
        outcome: TransitionOutcome,
    },
    Presented { presentation: Option<Presentation> },
    Performed { outcome: ActionOutcome },
    Discarded { removed: bool },
    Closed { discarded: usize },
    History { rows: Vec<HistoryRow> },
}

/// A step's result, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: &'static str,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Parses a JSON replay script.
pub fn parse_script(input: &str) -> Result<Vec<ScriptStep>> {
    serde_json::from_str(input).map_err(|e| SqlLabError::script(format!("Invalid script: {e}")))
}

/// Reads and parses a script file, or stdin when `path` is `-`.
pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| SqlLabError::script(format!("Failed to read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            SqlLabError::script(format!("Failed to read {}: {e}", path.display()))
        })?
    };
    parse_script(&content)
}

/// Runs `steps` against a session, stopping at the first error.
pub async fn run_script(handle: &SessionHandle, steps: Vec<ScriptStep>) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps.len());
    for (i, step) in steps.into_iter().enumerate() {
        let name = step.name();
        debug!(index = i + 1, step = name, "Replaying step");
        let result = run_step(handle, step).await?;
        reports.push(StepReport {
            index: i + 1,
            step: name,
            result,
        });
    }
    info!(steps = reports.len(), "Replay finished");
    Ok(reports)
}

async fn run_step(handle: &SessionHandle, step: ScriptStep) -> Result<StepResult> {
    Ok(match step {
        ScriptStep::Database(database) => {
            handle.add_database(database).await?;
            StepResult::Done
        }
        ScriptStep::OpenEditor(editor) => StepResult::Submitted {
            query_id: handle.open_editor(editor).await?,
        },
        ScriptStep::SetSql { editor, sql } => {
            handle.update_editor(editor, move |e| e.sql = sql).await?;
            StepResult::Done
        }
        ScriptStep::Run { editor, run_async } => StepResult::Submitted {
            query_id: handle.run(editor, run_async).await?,
        },
        ScriptStep::Ctas { editor, table } => {
            if let Some(table) = table {
                handle
                    .update_editor(editor.clone(), move |e| e.ctas_name = table)
                    .await?;
            }
            StepResult::Submitted {
                query_id: handle.create_table_as(editor).await?,
            }
        }
        ScriptStep::Stop { editor } => StepResult::Stopped {
            outcome: handle.stop(editor).await?,
        },
        ScriptStep::Notify {
            editor,
            query,
            event,
        } => {
            let query_id = target(handle, &editor, query).await?;
            let outcome = handle
                .notify(Notification::new(query_id.clone(), event))
                .await?;
            StepResult::Notified { query_id, outcome }
        }
        ScriptStep::Observe { editor } => StepResult::Presented {
            presentation: handle.observe(editor).await?,
        },
        ScriptStep::Act { editor, action } => {
            let presentation = handle.observe(editor.clone()).await?;
            let chosen = presentation
                .and_then(|p| p.actions.into_iter().find(|a| a.name() == action))
                .ok_or_else(|| {
                    SqlLabError::script(format!("No '{action}' action offered for '{editor}'"))
                })?;
            StepResult::Performed {
                outcome: handle.perform(chosen).await?,
            }
        }
        ScriptStep::Refetch { editor } => {
            let query_id = target(handle, &editor, None).await?;
            StepResult::Performed {
                outcome: handle
                    .perform(Action::RefetchResults {
                        query_id,
                        results_key: None,
                    })
                    .await?,
            }
        }
        ScriptStep::Discard { editor, query } => {
            let query_id = target(handle, &editor, query).await?;
            StepResult::Discarded {
                removed: handle.discard(query_id).await?,
            }
        }
        ScriptStep::Close { editor } => StepResult::Closed {
            discarded: handle.close_editor(editor).await?,
        },
        ScriptStep::History(filter) => StepResult::History {
            rows: handle.history(filter).await?,
        },
    })
}

async fn target(handle: &SessionHandle, editor: &str, query: Option<QueryId>) -> Result<QueryId> {
    match query {
        Some(id) => Ok(id),
        None => handle
            .latest_query(editor)
            .await?
            .ok_or_else(|| SqlLabError::script(format!("Editor '{editor}' has no query"))),
    }
}

/// Renders reports as one line per step.
pub fn render_text(reports: &[StepReport]) -> String {
    let mut out = String::new();
    for report in reports {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            report.index,
            report.step,
            describe(&report.result)
        ));
    }
    out
}

/// Renders reports as a JSON array.
pub fn render_json(reports: &[StepReport]) -> Result<String> {
    serde_json::to_string_pretty(reports)
        .map_err(|e| SqlLabError::internal(format!("Failed to serialize report: {e}")))
}

fn describe(result: &StepResult) -> String {
    match result {
        StepResult::Done => "ok".to_string(),
        StepResult::Submitted { query_id: Some(id) } => format!("submitted {id}"),
        StepResult::Submitted { query_id: None } => "nothing submitted".to_string(),
        StepResult::Stopped { outcome } => format!("{outcome:?}"),
        StepResult::Notified { query_id, outcome } => format!("{query_id} {outcome:?}"),
        StepResult::Presented { presentation: None } => "no query".to_string(),
        StepResult::Presented {
            presentation: Some(p),
        } => describe_presentation(p),
        StepResult::Performed { outcome } => format!("{outcome:?}"),
        StepResult::Discarded { removed } => {
            if *removed {
                "discarded".to_string()
            } else {
                "not found".to_string()
            }
        }
        StepResult::Closed { discarded } => format!("closed, {discarded} queries discarded"),
        StepResult::History { rows } => {
            let lines: Vec<String> = rows
                .iter()
                .map(|r| format!("{} {} {}", r.query_id, r.state, r.sql))
                .collect();
            format!("{} queries\n  {}", rows.len(), lines.join("\n  "))
        }
    }
}

fn describe_presentation(presentation: &Presentation) -> String {
    let view = match &presentation.view {
        View::Progress {
            state, progress, ..
        } => format!("{state} {progress}%"),
        View::Fetching { .. } => "fetching results".to_string(),
        View::Table {
            columns,
            rows,
            limit_reached,
            ..
        } => {
            let limit = if *limit_reached { " (limit reached)" } else { "" };
            format!("table [{}] {} rows{limit}", columns.join(", "), rows.len())
        }
        View::Warning { message } => format!("warning: {message}"),
        View::Error { message } => format!("error: {message}"),
        View::Info { message, .. } => format!("info: {message}"),
        View::FetchPrompt { .. } => "results released, fetch again".to_string(),
    };
    if presentation.actions.is_empty() {
        return view;
    }
    let actions: Vec<&str> = presentation.actions.iter().map(Action::name).collect();
    format!("{view} [{}]", actions.join(", "))
}
