//! Query state machine tests.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqllab::backend::{BackendCall, RecordingBackend};
use sqllab::query::{
    IgnoreReason, Notification, QueryEvent, QueryId, QueryLifecycle, QuerySpec, QueryState,
    StopOutcome, TransitionOutcome,
};

use super::common::one_row;

fn lifecycle() -> (Arc<RecordingBackend>, QueryLifecycle) {
    let backend = Arc::new(RecordingBackend::new());
    let lifecycle = QueryLifecycle::new(backend.clone(), "session timed out");
    (backend, lifecycle)
}

fn submit(lifecycle: &mut QueryLifecycle, sql: &str) -> QueryId {
    lifecycle.submit(QuerySpec::new(sql)).unwrap().id.clone()
}

fn every_event() -> Vec<QueryEvent> {
    vec![
        QueryEvent::progress(10),
        QueryEvent::succeeded("k1", one_row()),
        QueryEvent::created_table("tmp1"),
        QueryEvent::failed("boom"),
        QueryEvent::Stopped,
    ]
}

#[test]
fn test_submit_starts_running_without_progress() {
    let (backend, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    let query = lc.get(&id).unwrap();
    assert_eq!(query.state, QueryState::Running);
    assert_eq!(query.progress, 0);
    assert_eq!(backend.submissions(), vec![id]);
}

#[test]
fn test_refused_submission_creates_no_query() {
    let backend = Arc::new(RecordingBackend::refusing());
    let mut lc = QueryLifecycle::new(backend, "session timed out");

    let err = lc.submit(QuerySpec::new("SELECT 1")).unwrap_err();
    assert_eq!(err.category(), "Backend Error");
    assert!(lc.is_empty());
}

#[test]
fn test_no_transition_out_of_terminal_state() {
    let terminal = [
        QueryEvent::succeeded("k1", one_row()),
        QueryEvent::failed("boom"),
        QueryEvent::Stopped,
    ];

    for first in terminal {
        let (_, mut lc) = lifecycle();
        let id = submit(&mut lc, "SELECT 1");
        let reached = first.target_state().unwrap();
        lc.apply(&Notification::new(id.clone(), first));

        for event in every_event() {
            let outcome = lc.apply(&Notification::new(id.clone(), event));
            assert_eq!(
                outcome,
                TransitionOutcome::Ignored(IgnoreReason::AlreadyTerminal(reached))
            );
            assert_eq!(lc.get(&id).unwrap().state, reached);
        }
    }
}

#[test]
fn test_progress_may_reset() {
    let (_, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    lc.apply(&Notification::new(id.clone(), QueryEvent::progress(70)));
    lc.apply(&Notification::new(id.clone(), QueryEvent::progress(20)));
    assert_eq!(lc.get(&id).unwrap().progress, 20);
}

#[test]
fn test_tracking_url_on_running_update() {
    let (_, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    lc.apply(&Notification::new(
        id.clone(),
        QueryEvent::Progress {
            progress: 5,
            tracking_url: Some("http://jobs/1".to_string()),
        },
    ));
    assert_eq!(lc.get(&id).unwrap().tracking_url.as_deref(), Some("http://jobs/1"));

    lc.apply(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));
    assert_eq!(lc.get(&id).unwrap().tracking_url, None);
}

#[test]
fn test_stop_twice_sends_one_cancellation() {
    let (backend, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    assert_eq!(lc.request_stop(&id).unwrap(), StopOutcome::Requested);
    assert_eq!(lc.request_stop(&id).unwrap(), StopOutcome::AlreadyRequested);
    assert_eq!(backend.cancellations(&id), 1);

    lc.apply(&Notification::new(id.clone(), QueryEvent::Stopped));
    assert_eq!(
        lc.request_stop(&id).unwrap(),
        StopOutcome::NotRunning(QueryState::Stopped)
    );
    assert_eq!(backend.cancellations(&id), 1);
}

#[test]
fn test_stop_racing_with_success() {
    let (_, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    lc.request_stop(&id).unwrap();
    lc.apply(&Notification::new(id.clone(), QueryEvent::succeeded("k1", one_row())));
    let late = lc.apply(&Notification::new(id.clone(), QueryEvent::Stopped));

    assert!(!late.changed());
    assert_eq!(lc.get(&id).unwrap().state, QueryState::Success);
}

#[test]
fn test_failed_cancel_can_be_retried() {
    let (backend, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");

    backend.set_refusing(true);
    assert!(lc.request_stop(&id).is_err());
    assert!(!lc.stop_requested(&id));

    backend.set_refusing(false);
    assert_eq!(lc.request_stop(&id).unwrap(), StopOutcome::Requested);
    assert_eq!(backend.cancellations(&id), 1);
}

#[test]
fn test_session_timeout_resubmits_once() {
    let (backend, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");
    lc.apply(&Notification::new(
        id.clone(),
        QueryEvent::failed("session timed out after 300 seconds"),
    ));

    let retry = lc.on_session_timeout_detected(&id).unwrap().unwrap();
    assert_eq!(lc.on_session_timeout_detected(&id).unwrap(), None);

    let retried = lc.get(&retry).unwrap();
    assert_eq!(retried.state, QueryState::Running);
    assert_eq!(retried.resubmitted_from.as_ref(), Some(&id));
    assert_eq!(retried.sql(), "SELECT 1");
    // The original keeps its terminal record
    assert_eq!(lc.get(&id).unwrap().state, QueryState::Failed);

    // A retry that times out again is surfaced, not retried
    lc.apply(&Notification::new(
        retry.clone(),
        QueryEvent::failed("session timed out again"),
    ));
    assert_eq!(lc.on_session_timeout_detected(&retry).unwrap(), None);

    let submits = backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BackendCall::Submit { .. }))
        .count();
    assert_eq!(submits, 2);
}

#[test]
fn test_other_failures_are_not_retried() {
    let (_, mut lc) = lifecycle();
    let id = submit(&mut lc, "SELECT 1");
    lc.apply(&Notification::new(id.clone(), QueryEvent::failed("syntax error")));

    assert_eq!(lc.on_session_timeout_detected(&id).unwrap(), None);
    assert_eq!(lc.len(), 1);
}

#[test]
fn test_unknown_query_is_ignored() {
    let (_, mut lc) = lifecycle();
    let outcome = lc.apply(&Notification::new(QueryId::from("q-missing"), QueryEvent::Stopped));
    assert_eq!(outcome, TransitionOutcome::Ignored(IgnoreReason::UnknownQuery));
    assert!(lc.request_stop(&QueryId::from("q-missing")).is_err());
}

#[test]
fn test_failures_stay_local_to_one_query() {
    let (_, mut lc) = lifecycle();
    let a = submit(&mut lc, "SELECT 1");
    let b = submit(&mut lc, "SELECT 2");

    lc.apply(&Notification::new(a.clone(), QueryEvent::failed("boom")));
    assert_eq!(lc.get(&b).unwrap().state, QueryState::Running);
    assert_eq!(
        lc.queries().map(|q| q.id.clone()).collect::<Vec<_>>(),
        vec![a, b]
    );
}
