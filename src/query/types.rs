//! Query record and result types.
//!
//! Defines the structures the lifecycle tracks for each submitted query and
//! the row data the execution backend hands back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use super::spec::QuerySpec;

/// Opaque, process-unique identifier of a submitted query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    /// Generates a new unique query ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(format!("q-{}", COUNTER.fetch_add(1, Ordering::Relaxed)))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for QueryId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Execution state of a query.
///
/// `Running` is the only non-terminal state; nothing transitions back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    #[default]
    Running,
    Success,
    Failed,
    Stopped,
}

impl QueryState {
    /// Returns true for success, failed and stopped.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns the state as a string for display and filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a single value in a result row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to its display representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// A result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type, when the backend reports one.
    #[serde(default, rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Creates a column info with an unknown type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// A materialized result set.
///
/// Both halves are optional because backends do send partial payloads; a
/// payload missing either half is malformed and renders as "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    /// Ordered column descriptors.
    #[serde(default)]
    pub columns: Option<Vec<ColumnInfo>>,

    /// Ordered rows.
    #[serde(default)]
    pub data: Option<Vec<Row>>,
}

impl QueryResults {
    /// Creates a well-formed result set.
    pub fn new(columns: Vec<ColumnInfo>, data: Vec<Row>) -> Self {
        Self {
            columns: Some(columns),
            data: Some(data),
        }
    }

    /// Returns true when columns or data are missing.
    pub fn is_malformed(&self) -> bool {
        self.columns.is_none() || self.data.is_none()
    }

    /// Returns the rows, or an empty slice when absent.
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

/// A submitted query tracked from submission to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    /// What was submitted.
    pub spec: QuerySpec,
    pub state: QueryState,
    /// Percent complete; 0 means no progress signal yet.
    pub progress: u8,
    /// Link to the backend's job monitor.
    pub tracking_url: Option<String>,
    /// True when the query was a create-table-as.
    pub ctas: bool,
    /// Table created by a successful CTAS query.
    pub temp_table: Option<String>,
    /// Version token of the current materialized result set.
    pub results_key: Option<String>,
    pub results: Option<QueryResults>,
    /// True once the live store released `results` to reclaim memory.
    pub cached: bool,
    pub error_message: Option<String>,
    /// True if the result set was truncated at the server-side row cap.
    pub limit_reached: bool,
    /// Row count reported by the backend.
    pub rows: Option<usize>,
    /// The failed query this one automatically replaced.
    pub resubmitted_from: Option<QueryId>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
}

impl Query {
    /// Creates a freshly submitted query in the running state.
    pub fn new(id: QueryId, spec: QuerySpec) -> Self {
        Self {
            id,
            ctas: spec.ctas,
            spec,
            state: QueryState::Running,
            progress: 0,
            tracking_url: None,
            temp_table: None,
            results_key: None,
            results: None,
            cached: false,
            error_message: None,
            limit_reached: false,
            rows: None,
            resubmitted_from: None,
            started_at: SystemTime::now(),
            ended_at: None,
        }
    }

    /// Returns the submitted SQL.
    pub fn sql(&self) -> &str {
        &self.spec.sql
    }

    /// Returns how long the query ran, once it has ended.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .and_then(|end| end.duration_since(self.started_at).ok())
    }
}
