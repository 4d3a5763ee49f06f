//! Local copies of fetched result rows.
//!
//! Lets the live result store drop large row sets while the view can still
//! show what was last fetched. Entries are write-once per results key and
//! are only removed by [`ResultCache::invalidate`]; the cache never evicts
//! on its own.

use std::collections::HashMap;

use tracing::debug;

use crate::query::{ColumnInfo, Query, QueryId, QueryResults, Row};

/// Detached copy of one materialized result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    results_key: Option<String>,
    results: QueryResults,
}

impl CacheEntry {
    /// The results key the rows were captured under.
    pub fn results_key(&self) -> Option<&str> {
        self.results_key.as_deref()
    }

    /// The captured result set, shaped exactly as it arrived.
    pub fn results(&self) -> &QueryResults {
        &self.results
    }

    /// Captured column descriptors, if the payload had any.
    pub fn columns(&self) -> Option<&[ColumnInfo]> {
        self.results.columns.as_deref()
    }

    /// Captured rows.
    pub fn data(&self) -> &[Row] {
        self.results.rows()
    }
}

/// Why a capture did not store anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Caching is off for this hosting context.
    Disabled,
    /// The store already released the live results.
    AlreadyReleased,
    /// There are no rows to keep.
    NoData,
}

/// What a capture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A new entry was written.
    Captured,
    /// A newer result set replaced the previous entry.
    Replaced,
    /// An entry for this results key already exists and was left untouched.
    Unchanged,
    Skipped(SkipReason),
}

impl CaptureOutcome {
    /// Returns true when the cache holds the query's current rows, so the
    /// live copy may be released.
    pub fn holds_rows(&self) -> bool {
        matches!(self, Self::Captured | Self::Replaced | Self::Unchanged)
    }
}

/// Per-session store of captured result rows.
#[derive(Debug, Default)]
pub struct ResultCache {
    enabled: bool,
    entries: HashMap<QueryId, CacheEntry>,
}

impl ResultCache {
    /// Creates a cache; a disabled cache never stores anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: HashMap::new(),
        }
    }

    /// Copies the query's live rows into the cache.
    pub fn capture(&mut self, query: &Query) -> CaptureOutcome {
        if !self.enabled {
            return CaptureOutcome::Skipped(SkipReason::Disabled);
        }
        if query.cached {
            return CaptureOutcome::Skipped(SkipReason::AlreadyReleased);
        }
        let Some(results) = query.results.as_ref().filter(|r| !r.rows().is_empty()) else {
            return CaptureOutcome::Skipped(SkipReason::NoData);
        };

        let previous = self.entries.get(&query.id);
        if previous.is_some_and(|e| e.results_key == query.results_key) {
            return CaptureOutcome::Unchanged;
        }
        let outcome = if previous.is_some() {
            CaptureOutcome::Replaced
        } else {
            CaptureOutcome::Captured
        };

        let entry = CacheEntry {
            results_key: query.results_key.clone(),
            results: results.clone(),
        };
        debug!(
            query = %query.id,
            results_key = ?entry.results_key,
            rows = entry.data().len(),
            "Captured result rows"
        );
        self.entries.insert(query.id.clone(), entry);
        outcome
    }

    /// Returns the captured rows for a query. Never triggers a fetch.
    pub fn get(&self, id: &QueryId) -> Option<&[Row]> {
        self.entries.get(id).map(|e| e.data())
    }

    /// Returns the full entry for a query.
    pub fn entry(&self, id: &QueryId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    /// Drops the entry for a discarded query. Returns true if one existed.
    pub fn invalidate(&mut self, id: &QueryId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            debug!(query = %id, "Invalidated cached rows");
        }
        removed
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
