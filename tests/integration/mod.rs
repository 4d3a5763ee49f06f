//! Integration tests for the SQL Lab query lifecycle.

pub mod cache_test;
pub mod common;
pub mod lifecycle_test;
pub mod presenter_test;
pub mod replay_test;
pub mod scenarios_test;
