//! What the result pane shows for a query and what the user may do there.
//!
//! [`present`] is a pure projection of a query record and the result cache.
//! [`ResultObserver`] is the only stateful part: it remembers the last
//! results key rendered per query so a new key can trigger a fetch.

use serde::Serialize;
use std::collections::HashMap;
use url::Url;

use crate::cache::{CacheEntry, ResultCache};
use crate::config::Config;
use crate::editor::EditorTemplate;
use crate::error::Result;
use crate::query::{Effect, Query, QueryId, QueryResults, QueryState, Row};

pub const STOPPED_MESSAGE: &str = "Query was stopped";
pub const NO_DATA_MESSAGE: &str = "The query returned no data";

/// Inputs to [`present`] supplied by the hosting context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenterOptions {
    /// Read released results from the result cache.
    pub cache_enabled: bool,
    pub csv: bool,
    pub xlsx: bool,
    pub visualize: bool,
    pub clipboard: bool,
    pub search: bool,
    pub show_sql: bool,
    /// Base for export links.
    pub base_url: Url,
}

impl PresenterOptions {
    /// Builds options from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let results = &config.results;
        Ok(Self {
            cache_enabled: results.cache,
            csv: results.csv,
            xlsx: results.xlsx,
            visualize: results.visualize,
            clipboard: results.clipboard,
            search: results.search,
            show_sql: results.show_sql,
            base_url: config.server.base_url()?,
        })
    }

    fn export_href(&self, kind: &str, id: &QueryId) -> Option<String> {
        self.base_url
            .join(&format!("/superset/{kind}/{id}"))
            .ok()
            .map(String::from)
    }
}

/// Discriminant of [`View`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Progress,
    Fetching,
    Table,
    Warning,
    Error,
    Info,
    FetchPrompt,
}

/// Content of the result pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    /// The query is running.
    Progress {
        state: QueryState,
        progress: u8,
        /// False until the first progress signal; show an indeterminate
        /// indicator instead.
        show_progress_bar: bool,
        tracking_url: Option<String>,
    },
    /// The query succeeded and its results are on their way.
    Fetching { state: QueryState },
    Table {
        columns: Vec<String>,
        rows: Vec<Row>,
        limit_reached: bool,
        sql: Option<String>,
    },
    Warning { message: String },
    /// Execution failure, shown verbatim.
    Error { message: String },
    /// A create-table-as query created `temp_table`.
    Info { message: String, temp_table: String },
    /// Results were released and no local copy exists.
    FetchPrompt { results_key: Option<String> },
}

impl View {
    /// Returns the view's kind.
    pub fn kind(&self) -> ViewKind {
        match self {
            Self::Progress { .. } => ViewKind::Progress,
            Self::Fetching { .. } => ViewKind::Fetching,
            Self::Table { .. } => ViewKind::Table,
            Self::Warning { .. } => ViewKind::Warning,
            Self::Error { .. } => ViewKind::Error,
            Self::Info { .. } => ViewKind::Info,
            Self::FetchPrompt { .. } => ViewKind::FetchPrompt,
        }
    }
}

/// Something the user may trigger from the result pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Cancel the running query.
    Stop { query_id: QueryId },
    /// Open the backend's job monitor.
    TrackJob { url: String },
    /// Open a new editor tab, e.g. on a table a CTAS query created.
    OpenInNewTab { template: EditorTemplate },
    /// Ask the result store to materialize the results again.
    RefetchResults {
        query_id: QueryId,
        results_key: Option<String>,
    },
    Visualize { query_id: QueryId },
    ExportCsv { href: String },
    ExportXlsx { href: String },
    /// Copy the table; performed by the view, never by the core.
    CopyToClipboard,
    Search,
}

impl Action {
    /// Returns the action's serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stop { .. } => "stop",
            Self::TrackJob { .. } => "track_job",
            Self::OpenInNewTab { .. } => "open_in_new_tab",
            Self::RefetchResults { .. } => "refetch_results",
            Self::Visualize { .. } => "visualize",
            Self::ExportCsv { .. } => "export_csv",
            Self::ExportXlsx { .. } => "export_xlsx",
            Self::CopyToClipboard => "copy_to_clipboard",
            Self::Search => "search",
        }
    }
}

/// The view plus the actions currently allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub view: View,
    pub actions: Vec<Action>,
}

impl Presentation {
    fn view(view: View) -> Self {
        Self {
            view,
            actions: Vec::new(),
        }
    }

    fn warning(message: &str) -> Self {
        Self::view(View::Warning {
            message: message.to_string(),
        })
    }

    /// Returns the view's kind.
    pub fn kind(&self) -> ViewKind {
        self.view.kind()
    }
}

/// Decides what to show for `query`.
pub fn present(query: &Query, options: &PresenterOptions, cache: &ResultCache) -> Presentation {
    match query.state {
        QueryState::Stopped => Presentation::warning(STOPPED_MESSAGE),
        QueryState::Failed => Presentation::view(View::Error {
            message: query.error_message.clone().unwrap_or_default(),
        }),
        QueryState::Success if query.ctas => present_created_table(query),
        QueryState::Success => present_results(query, options, cache),
        QueryState::Running => present_progress(query),
    }
}

fn present_created_table(query: &Query) -> Presentation {
    let temp_table = query
        .temp_table
        .clone()
        .or_else(|| query.spec.temp_table_name.clone())
        .unwrap_or_default();
    let template =
        EditorTemplate::select_star(&temp_table, query.spec.db_id, query.spec.schema.clone());

    Presentation {
        view: View::Info {
            message: format!("Table [{temp_table}] was created"),
            temp_table,
        },
        actions: vec![Action::OpenInNewTab { template }],
    }
}

fn present_results(query: &Query, options: &PresenterOptions, cache: &ResultCache) -> Presentation {
    let resolved: Option<&QueryResults> = if options.cache_enabled && query.cached {
        cache.entry(&query.id).map(CacheEntry::results)
    } else {
        query.results.as_ref()
    };

    match resolved {
        // A malformed payload is treated like an empty result
        Some(results) if !results.is_malformed() && results.row_count() > 0 => Presentation {
            view: View::Table {
                columns: results.column_names(),
                rows: results.rows().to_vec(),
                limit_reached: query.limit_reached,
                sql: options.show_sql.then(|| query.sql().to_string()),
            },
            actions: table_controls(query, options),
        },
        Some(_) => Presentation::warning(NO_DATA_MESSAGE),
        None if query.cached => Presentation {
            view: View::FetchPrompt {
                results_key: query.results_key.clone(),
            },
            actions: vec![Action::RefetchResults {
                query_id: query.id.clone(),
                results_key: query.results_key.clone(),
            }],
        },
        None => Presentation::view(View::Fetching { state: query.state }),
    }
}

fn table_controls(query: &Query, options: &PresenterOptions) -> Vec<Action> {
    let mut actions = Vec::new();
    if options.visualize {
        actions.push(Action::Visualize {
            query_id: query.id.clone(),
        });
    }
    if options.csv {
        if let Some(href) = options.export_href("csv", &query.id) {
            actions.push(Action::ExportCsv { href });
        }
    }
    if options.xlsx {
        if let Some(href) = options.export_href("xlsx", &query.id) {
            actions.push(Action::ExportXlsx { href });
        }
    }
    if options.clipboard {
        actions.push(Action::CopyToClipboard);
    }
    if options.search {
        actions.push(Action::Search);
    }
    actions
}

fn present_progress(query: &Query) -> Presentation {
    let mut actions = vec![Action::Stop {
        query_id: query.id.clone(),
    }];
    if let Some(url) = &query.tracking_url {
        actions.push(Action::TrackJob { url: url.clone() });
    }

    Presentation {
        view: View::Progress {
            state: query.state,
            progress: query.progress,
            show_progress_bar: query.progress > 0,
            tracking_url: query.tracking_url.clone(),
        },
        actions,
    }
}

/// Tracks the last results key rendered for each query.
#[derive(Debug, Default)]
pub struct ResultObserver {
    rendered: HashMap<QueryId, Option<String>>,
}

impl ResultObserver {
    /// Creates an observer that has seen nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `query` is about to be rendered and returns the effects
    /// to run first.
    ///
    /// A results key that differs from the one rendered last time yields a
    /// fetch. The first observation only records the key.
    pub fn observe(&mut self, query: &Query) -> Vec<Effect> {
        let Some(previous) = self
            .rendered
            .insert(query.id.clone(), query.results_key.clone())
        else {
            return Vec::new();
        };

        match &query.results_key {
            Some(key) if previous.as_ref() != Some(key) => vec![Effect::FetchResults {
                query_id: query.id.clone(),
                results_key: key.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Forgets a discarded query.
    pub fn forget(&mut self, id: &QueryId) {
        self.rendered.remove(id);
    }
}
