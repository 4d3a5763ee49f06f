//! Editor tabs and the submissions they produce.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::query::{QueryId, QuerySpec, SqlType};

/// Generates a new unique editor ID.
pub fn next_editor_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("tab-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A database connection an editor can target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: i64,
    pub name: String,
    /// Whether queries may run synchronously; if not, every run is async.
    #[serde(default)]
    pub allow_run_sync: bool,
    /// Whether create-table-as is offered.
    #[serde(default)]
    pub allow_ctas: bool,
}

/// An editor tab in SQL Lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEditor {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub db_id: Option<i64>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub sql: String,
    /// Text highlighted in the editor; runs instead of the full SQL.
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub sql_type: SqlType,
    #[serde(default)]
    pub template_params: Option<String>,
    /// Run once as soon as the editor is opened.
    #[serde(default)]
    pub autorun: bool,
    /// Table name for create-table-as.
    #[serde(default)]
    pub ctas_name: String,
    /// Most recent query submitted from this editor.
    #[serde(default)]
    pub latest_query_id: Option<QueryId>,
}

impl QueryEditor {
    /// Creates an empty editor.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            db_id: None,
            schema: None,
            sql: String::new(),
            selected_text: None,
            sql_type: SqlType::default(),
            template_params: None,
            autorun: false,
            ctas_name: String::new(),
            latest_query_id: None,
        }
    }

    /// Creates an editor from a template with a fresh ID.
    pub fn from_template(template: &EditorTemplate) -> Self {
        let mut editor = Self::new(next_editor_id(), template.title.clone());
        editor.db_id = template.db_id;
        editor.schema = template.schema.clone();
        editor.sql = template.sql.clone();
        editor.autorun = template.autorun;
        editor
    }

    /// Sets the database connection.
    pub fn with_db(mut self, db_id: i64) -> Self {
        self.db_id = Some(db_id);
        self
    }

    /// Sets the editor SQL.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = sql.into();
        self
    }

    /// Marks the editor to run on open.
    pub fn with_autorun(mut self, autorun: bool) -> Self {
        self.autorun = autorun;
        self
    }

    /// Returns the SQL a run would submit: the selection if there is one.
    pub fn effective_sql(&self) -> &str {
        match self.selected_text.as_deref() {
            Some(selected) if !selected.trim().is_empty() => selected,
            _ => &self.sql,
        }
    }

    /// Builds the submission for a run of this editor.
    pub fn to_spec(&self, run_async: bool, ctas: bool) -> QuerySpec {
        QuerySpec {
            db_id: self.db_id,
            sql: self.effective_sql().to_string(),
            schema: self.schema.clone(),
            tab: Some(self.title.clone()),
            sql_editor_id: Some(self.id.clone()),
            temp_table_name: ctas.then(|| self.ctas_name.clone()),
            template_params: self.template_params.clone(),
            sql_type: self.sql_type,
            run_async,
            ctas,
        }
    }
}

/// Blueprint for a new editor tab, e.g. one querying a freshly created table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorTemplate {
    pub title: String,
    pub db_id: Option<i64>,
    pub schema: Option<String>,
    pub sql: String,
    pub autorun: bool,
}

impl EditorTemplate {
    /// Template for `SELECT * FROM {table}` on the same database.
    pub fn select_star(table: &str, db_id: Option<i64>, schema: Option<String>) -> Self {
        Self {
            title: table.to_string(),
            db_id,
            schema,
            sql: format!("SELECT * FROM {table}"),
            autorun: false,
        }
    }
}
