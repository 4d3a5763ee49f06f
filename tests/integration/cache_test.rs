//! Result cache tests.

use pretty_assertions::assert_eq;
use sqllab::cache::{CaptureOutcome, ResultCache, SkipReason};
use sqllab::query::{row, ColumnInfo, Query, QueryId, QueryResults, QuerySpec, QueryState};

use super::common::one_row;

fn succeeded(id: &str, key: &str, results: QueryResults) -> Query {
    let mut q = Query::new(QueryId::from(id), QuerySpec::new("SELECT a FROM t"));
    q.state = QueryState::Success;
    q.results_key = Some(key.to_string());
    q.results = Some(results);
    q
}

#[test]
fn test_capture_survives_release() {
    let mut cache = ResultCache::new(true);
    let mut q = succeeded("q-1", "k1", one_row());
    let expected = q.results.as_ref().unwrap().rows().to_vec();

    assert_eq!(cache.capture(&q), CaptureOutcome::Captured);

    // The store drops its live copy
    q.results = None;
    q.cached = true;
    assert_eq!(cache.get(&q.id), Some(&expected[..]));
}

#[test]
fn test_capture_same_key_twice_is_unchanged() {
    let mut once = ResultCache::new(true);
    let mut twice = ResultCache::new(true);
    let q = succeeded("q-1", "k1", one_row());

    once.capture(&q);
    twice.capture(&q);
    assert_eq!(twice.capture(&q), CaptureOutcome::Unchanged);

    assert_eq!(once.entry(&q.id), twice.entry(&q.id));
    assert_eq!(twice.len(), 1);
}

#[test]
fn test_new_results_key_replaces_entry() {
    let mut cache = ResultCache::new(true);
    cache.capture(&succeeded("q-1", "k1", one_row()));

    let newer = QueryResults::new(
        vec![ColumnInfo::named("a")],
        vec![row([("a", 2)]), row([("a", 3)])],
    );
    let q = succeeded("q-1", "k2", newer);
    assert_eq!(cache.capture(&q), CaptureOutcome::Replaced);

    let entry = cache.entry(&q.id).unwrap();
    assert_eq!(entry.results_key(), Some("k2"));
    assert_eq!(entry.data().len(), 2);
}

#[test]
fn test_capture_skips() {
    let q = succeeded("q-1", "k1", one_row());
    assert_eq!(
        ResultCache::new(false).capture(&q),
        CaptureOutcome::Skipped(SkipReason::Disabled)
    );

    let mut cache = ResultCache::new(true);
    let empty = succeeded("q-2", "k1", QueryResults::new(vec![], vec![]));
    assert_eq!(
        cache.capture(&empty),
        CaptureOutcome::Skipped(SkipReason::NoData)
    );

    let mut released = succeeded("q-3", "k1", one_row());
    released.cached = true;
    assert_eq!(
        cache.capture(&released),
        CaptureOutcome::Skipped(SkipReason::AlreadyReleased)
    );
    assert!(cache.is_empty());
}

#[test]
fn test_invalidate() {
    let mut cache = ResultCache::new(true);
    let q = succeeded("q-1", "k1", one_row());
    cache.capture(&q);

    assert!(cache.invalidate(&q.id));
    assert!(!cache.invalidate(&q.id));
    assert_eq!(cache.get(&q.id), None);
}
