//! What gets submitted to the execution backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL dialect the editor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    #[default]
    Presto,
    Hive,
}

impl SqlType {
    /// Returns the dialect as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presto => "presto",
            Self::Hive => "hive",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Database connection the query runs against.
    #[serde(default)]
    pub db_id: Option<i64>,
    pub sql: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Title of the editor tab that submitted the query.
    #[serde(default)]
    pub tab: Option<String>,
    #[serde(default)]
    pub sql_editor_id: Option<String>,
    /// Target table name for create-table-as.
    #[serde(default)]
    pub temp_table_name: Option<String>,
    /// JSON-encoded template parameters.
    #[serde(default)]
    pub template_params: Option<String>,
    #[serde(default)]
    pub sql_type: SqlType,
    #[serde(default)]
    pub run_async: bool,
    #[serde(default)]
    pub ctas: bool,
}

impl QuerySpec {
    /// Creates a synchronous, non-CTAS submission of `sql`.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Sets the database connection.
    pub fn with_db(mut self, db_id: i64) -> Self {
        self.db_id = Some(db_id);
        self
    }

    /// Sets the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the SQL dialect.
    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }

    /// Requests asynchronous execution.
    pub fn run_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    /// Turns the submission into a create-table-as into `table`.
    pub fn create_table_as(mut self, table: impl Into<String>) -> Self {
        self.ctas = true;
        self.temp_table_name = Some(table.into());
        self
    }
}
