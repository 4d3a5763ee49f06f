//! Result presentation tests.

use pretty_assertions::assert_eq;
use sqllab::cache::ResultCache;
use sqllab::config::Config;
use sqllab::presenter::{
    present, Action, PresenterOptions, View, ViewKind, NO_DATA_MESSAGE, STOPPED_MESSAGE,
};
use sqllab::query::{Query, QueryId, QueryResults, QuerySpec, QueryState};

use super::common::one_row;

fn options(cache_enabled: bool) -> PresenterOptions {
    let mut config = Config::default();
    config.results.cache = cache_enabled;
    PresenterOptions::from_config(&config).unwrap()
}

fn query(state: QueryState) -> Query {
    let mut q = Query::new(QueryId::from("q-1"), QuerySpec::new("SELECT a FROM t"));
    q.state = state;
    q
}

#[test]
fn test_stopped_and_failed() {
    let cache = ResultCache::new(false);

    let p = present(&query(QueryState::Stopped), &options(false), &cache);
    assert_eq!(
        p.view,
        View::Warning {
            message: STOPPED_MESSAGE.to_string()
        }
    );

    let mut failed = query(QueryState::Failed);
    failed.error_message = Some("relation \"t\" does not exist".to_string());
    let p = present(&failed, &options(false), &cache);
    assert_eq!(
        p.view,
        View::Error {
            message: "relation \"t\" does not exist".to_string()
        }
    );
    assert!(p.actions.is_empty());
}

#[test]
fn test_running_actions() {
    let cache = ResultCache::new(false);
    let mut q = query(QueryState::Running);

    let p = present(&q, &options(false), &cache);
    assert_eq!(
        p.actions,
        vec![Action::Stop {
            query_id: q.id.clone()
        }]
    );
    match p.view {
        View::Progress {
            show_progress_bar, ..
        } => assert!(!show_progress_bar),
        other => panic!("Expected Progress, got {:?}", other),
    }

    q.progress = 5;
    q.tracking_url = Some("http://jobs/1".to_string());
    let p = present(&q, &options(false), &cache);
    assert_eq!(p.actions.len(), 2);
    assert_eq!(p.actions[1].name(), "track_job");
}

#[test]
fn test_malformed_results_show_no_data() {
    let cache = ResultCache::new(false);
    let mut q = query(QueryState::Success);
    q.results = Some(QueryResults {
        columns: None,
        data: Some(one_row().rows().to_vec()),
    });

    let p = present(&q, &options(false), &cache);
    assert_eq!(
        p.view,
        View::Warning {
            message: NO_DATA_MESSAGE.to_string()
        }
    );
}

#[test]
fn test_table_controls_follow_config() {
    let mut config = Config::default();
    config.results.xlsx = false;
    config.results.show_sql = true;
    let opts = PresenterOptions::from_config(&config).unwrap();

    let mut q = query(QueryState::Success);
    q.results = Some(one_row());
    let p = present(&q, &opts, &ResultCache::new(false));

    let names: Vec<&str> = p.actions.iter().map(Action::name).collect();
    assert_eq!(
        names,
        vec!["visualize", "export_csv", "copy_to_clipboard", "search"]
    );
    assert_eq!(
        p.actions[1],
        Action::ExportCsv {
            href: "http://localhost:8088/superset/csv/q-1".to_string()
        }
    );
    match p.view {
        View::Table { sql, .. } => assert_eq!(sql.as_deref(), Some("SELECT a FROM t")),
        other => panic!("Expected Table, got {:?}", other),
    }
}

#[test]
fn test_cached_query_reads_cache() {
    let mut cache = ResultCache::new(true);
    let mut q = query(QueryState::Success);
    q.results_key = Some("k1".to_string());
    q.results = Some(one_row());
    cache.capture(&q);

    q.results = None;
    q.cached = true;
    let p = present(&q, &options(true), &cache);
    assert_eq!(p.kind(), ViewKind::Table);

    // With caching off the same query needs a refetch
    let p = present(&q, &options(false), &cache);
    assert_eq!(p.kind(), ViewKind::FetchPrompt);
}

#[test]
fn test_present_is_deterministic() {
    let cache = ResultCache::new(false);
    let mut q = query(QueryState::Success);
    q.results = Some(one_row());

    let opts = options(false);
    assert_eq!(present(&q, &opts, &cache), present(&q, &opts, &cache));
}
