//! Error types for SQL Lab.
//!
//! Query-level outcomes (a failed execution, an empty result, a cache miss)
//! are presentations, not errors. This enum covers collaborator faults and
//! misuse of the API.

use thiserror::Error;

use crate::query::QueryId;

/// Main error type for SQL Lab operations.
#[derive(Error, Debug)]
pub enum SqlLabError {
    /// The execution backend refused a submit or cancel call.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The authoritative result store refused a fetch call.
    #[error("Result store error: {0}")]
    Store(String),

    /// An operation referenced a query the lifecycle does not track.
    #[error("Unknown query: {0}")]
    UnknownQuery(QueryId),

    /// An operation referenced an editor tab that is not open.
    #[error("Unknown editor: {0}")]
    UnknownEditor(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Replay script errors (unreadable file, malformed step, etc.)
    #[error("Script error: {0}")]
    Script(String),

    /// Internal application errors (unexpected states, closed channels, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SqlLabError {
    /// Creates a backend error with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Creates a result store error with the given message.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates an unknown editor error.
    pub fn unknown_editor(id: impl Into<String>) -> Self {
        Self::UnknownEditor(id.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a script error with the given message.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Backend(_) => "Backend Error",
            Self::Store(_) => "Result Store Error",
            Self::UnknownQuery(_) => "Unknown Query",
            Self::UnknownEditor(_) => "Unknown Editor",
            Self::Config(_) => "Configuration Error",
            Self::Script(_) => "Script Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using SqlLabError.
pub type Result<T> = std::result::Result<T, SqlLabError>;
