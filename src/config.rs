//! Configuration management for SQL Lab.
//!
//! Handles loading configuration from TOML files. Every section is optional
//! and falls back to the defaults of a stock SQL Lab panel.

use crate::error::{Result, SqlLabError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default marker searched for in error messages to detect an expired
/// backend session.
pub const DEFAULT_SESSION_TIMEOUT_MARKER: &str = "session timed out";

/// Main configuration structure for SQL Lab.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Result view settings for this hosting context.
    #[serde(default)]
    pub results: ResultsConfig,

    /// Query lifecycle settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Server settings used to build links.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Result view configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsConfig {
    /// Keep a local copy of fetched rows and let the store release its own.
    #[serde(default)]
    pub cache: bool,

    /// Offer a CSV export link.
    #[serde(default = "default_true")]
    pub csv: bool,

    /// Offer an Excel export link.
    #[serde(default = "default_true")]
    pub xlsx: bool,

    /// Offer the visualize action.
    #[serde(default = "default_true")]
    pub visualize: bool,

    /// Offer copy-to-clipboard.
    #[serde(default = "default_true")]
    pub clipboard: bool,

    /// Offer result search.
    #[serde(default = "default_true")]
    pub search: bool,

    /// Include the query's SQL alongside the result table.
    #[serde(default)]
    pub show_sql: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            cache: false,
            csv: true,
            xlsx: true,
            visualize: true,
            clipboard: true,
            search: true,
            show_sql: false,
        }
    }
}

/// Query lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Substring that marks a failure as an expired backend session.
    #[serde(default = "default_session_timeout_marker")]
    pub session_timeout_marker: String,
}

fn default_session_timeout_marker() -> String {
    DEFAULT_SESSION_TIMEOUT_MARKER.to_string()
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            session_timeout_marker: default_session_timeout_marker(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the web application, used for export links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://localhost:8088".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl ServerConfig {
    /// Parses the configured base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            SqlLabError::config(format!("Invalid base_url '{}': {e}", self.base_url))
        })
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqllab")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SqlLabError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string and validates it.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            SqlLabError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.session_timeout_marker.trim().is_empty() {
            return Err(SqlLabError::config(
                "lifecycle.session_timeout_marker must not be empty",
            ));
        }
        self.server.base_url()?;
        Ok(())
    }
}
