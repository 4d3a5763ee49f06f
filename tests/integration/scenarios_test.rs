//! End-to-end session scenarios.

use pretty_assertions::assert_eq;
use sqllab::backend::StoreCall;
use sqllab::history::HistoryFilter;
use sqllab::presenter::{Action, View, ViewKind};
use sqllab::query::{row, ColumnInfo, Notification, QueryEvent, QueryResults, QueryState};
use sqllab::session::ActionOutcome;

use super::common::{one_row, Harness, EDITOR};

#[test]
fn test_running_query_shows_progress() {
    let mut h = Harness::new(false);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::progress(40)));

    let p = h.session.observe(&id).unwrap();
    match p.view {
        View::Progress {
            state,
            progress,
            show_progress_bar,
            ..
        } => {
            assert_eq!(state, QueryState::Running);
            assert_eq!(progress, 40);
            assert!(show_progress_bar);
        }
        other => panic!("Expected Progress, got {:?}", other),
    }
}

#[test]
fn test_successful_query_shows_table() {
    let mut h = Harness::new(false);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session.observe(&id).unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));

    let p = h.session.observe(&id).unwrap();
    match p.view {
        View::Table { columns, rows, .. } => {
            assert_eq!(columns, vec!["a".to_string()]);
            assert_eq!(rows, vec![row([("a", 1)])]);
        }
        other => panic!("Expected Table, got {:?}", other),
    }
}

#[test]
fn test_released_results_without_capture_prompt_refetch() {
    let mut h = Harness::new(false);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::ResultsReleased));

    let p = h.session.observe(&id).unwrap();
    assert_eq!(p.kind(), ViewKind::FetchPrompt);
    assert_eq!(
        p.actions,
        vec![Action::RefetchResults {
            query_id: id.clone(),
            results_key: Some("k1".to_string())
        }]
    );

    // The store answers the refetch with a new key
    h.session.perform(&p.actions[0]).unwrap();
    h.session.handle(&Notification::new(
        id.clone(),
        QueryEvent::ResultsFetched {
            results_key: Some("k2".to_string()),
            results: one_row(),
        },
    ));
    assert_eq!(h.session.observe(&id).unwrap().kind(), ViewKind::Table);
    assert_eq!(
        h.store.calls(),
        vec![
            StoreCall::Refetch {
                query_id: id.clone(),
                results_key: Some("k1".to_string())
            },
            StoreCall::Fetch {
                query_id: id,
                results_key: "k2".to_string()
            },
        ]
    );
}

#[test]
fn test_session_timeout_resubmits_exactly_once() {
    let mut h = Harness::new(false);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session.handle(&Notification::new(
        id.clone(),
        QueryEvent::failed("session timed out after 300s"),
    ));

    // Re-rendering repeatedly must not resubmit again
    for _ in 0..3 {
        let p = h.session.observe_editor(EDITOR).unwrap().unwrap();
        assert_ne!(p.kind(), ViewKind::Error);
    }
    h.session.observe(&id).unwrap();

    assert_eq!(h.backend.submissions().len(), 2);
    let latest = h.session.latest_query(EDITOR).unwrap();
    assert_eq!(latest.resubmitted_from.as_ref(), Some(&id));
    assert_eq!(latest.state, QueryState::Running);
}

#[test]
fn test_created_table_offers_new_tab() {
    let mut h = Harness::new(false);
    h.session.editor_mut(EDITOR).unwrap().ctas_name = "tmp1".to_string();
    let id = h.session.create_table_as(EDITOR).unwrap().unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::created_table("tmp1")));

    let p = h.session.observe(&id).unwrap();
    assert_eq!(p.kind(), ViewKind::Info);
    assert!(p.actions.iter().all(|a| a.name() == "open_in_new_tab"));
    match &p.actions[0] {
        Action::OpenInNewTab { template } => assert_eq!(template.sql, "SELECT * FROM tmp1"),
        other => panic!("Expected OpenInNewTab, got {:?}", other),
    }

    match h.session.perform(&p.actions[0]).unwrap() {
        ActionOutcome::EditorOpened { editor_id, .. } => {
            assert_eq!(h.session.editor(&editor_id).unwrap().title, "tmp1");
        }
        other => panic!("Expected EditorOpened, got {:?}", other),
    }
}

#[test]
fn test_empty_result_is_a_warning() {
    let mut h = Harness::new(false);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session.handle(&Notification::new(
        id.clone(),
        QueryEvent::succeeded("k1", QueryResults::new(Vec::<ColumnInfo>::new(), vec![])),
    ));

    let p = h.session.observe(&id).unwrap();
    assert_eq!(p.kind(), ViewKind::Warning);
    assert!(p.actions.is_empty());
}

#[test]
fn test_cached_rows_outlive_live_results() {
    let mut h = Harness::new(true);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));

    let first = h.session.observe(&id).unwrap();
    let query = h.session.query(&id).unwrap();
    assert!(query.cached);
    assert!(query.results.is_none());

    let second = h.session.observe(&id).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_closing_editor_discards_everything() {
    let mut h = Harness::new(true);
    let id = h.session.run_editor(EDITOR, false).unwrap().unwrap();
    h.session
        .handle(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));
    h.session.observe(&id).unwrap();

    assert_eq!(h.session.close_editor(EDITOR).unwrap(), 1);
    assert!(h.session.cache().get(&id).is_none());
    assert!(h.session.history(&HistoryFilter::default()).is_empty());

    // Late notifications for the discarded query are dropped
    assert!(!h
        .session
        .handle(&Notification::new(id, QueryEvent::Stopped))
        .changed());
}
