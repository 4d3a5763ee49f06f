//! SQL Lab query-result lifecycle.
//!
//! Tracks submitted queries to a terminal outcome, caches materialized rows
//! and decides what the result pane shows.

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod logging;
pub mod presenter;
pub mod query;
pub mod replay;
pub mod session;
