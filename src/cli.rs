//! Command-line argument parsing.

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Output format for replay reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per step.
    #[default]
    Text,
    /// JSON array of step reports.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// SQL Lab query lifecycle, driven headless.
#[derive(Parser, Debug)]
#[command(name = "sqllab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to the state-dir log file instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a JSON script of session steps against a recording backend
    Replay {
        /// Path to the script file (use "-" for stdin)
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Read released results from the local result cache
        #[arg(long, env = "SQLLAB_CACHE")]
        cache: bool,

        /// Output format
        #[arg(long, value_name = "FORMAT", default_value = "text")]
        output: OutputFormat,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}
