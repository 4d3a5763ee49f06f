//! Replay scripts driven through the session actor.

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqllab::backend::{RecordingBackend, RecordingStore};
use sqllab::config::Config;
use sqllab::query::{QueryState, StopOutcome};
use sqllab::replay::{load_script, render_text, run_script, StepResult};
use sqllab::session::{spawn, Session};

fn write_script(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_replay_stop_and_history() {
    let script = write_script(
        r#"[
            {"step": "open_editor", "id": "e1", "title": "Untitled", "sql": "SELECT 1"},
            {"step": "run", "editor": "e1"},
            {"step": "stop", "editor": "e1"},
            {"step": "stop", "editor": "e1"},
            {"step": "notify", "editor": "e1", "event": {"type": "stopped"}},
            {"step": "observe", "editor": "e1"},
            {"step": "history", "state": "stopped"}
        ]"#,
    );
    let steps = load_script(script.path()).unwrap();

    let backend = Arc::new(RecordingBackend::new());
    let session = Session::new(
        &Config::default(),
        backend.clone(),
        Arc::new(RecordingStore::new()),
    )
    .unwrap();
    let (handle, task) = spawn(session);
    let reports = run_script(&handle, steps).await.unwrap();

    assert_eq!(
        reports[2].result,
        StepResult::Stopped {
            outcome: Some(StopOutcome::Requested)
        }
    );
    assert_eq!(
        reports[3].result,
        StepResult::Stopped {
            outcome: Some(StopOutcome::AlreadyRequested)
        }
    );
    match &reports[6].result {
        StepResult::History { rows } => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].state, QueryState::Stopped);
        }
        other => panic!("Expected History, got {:?}", other),
    }

    let text = render_text(&reports);
    assert!(text.contains("[6] observe: warning: Query was stopped"));

    handle.shutdown().await.unwrap();
    let session = task.await.unwrap();
    let id = session.latest_query("e1").unwrap().id.clone();
    assert_eq!(backend.cancellations(&id), 1);
}

#[test]
fn test_replay_with_cache_from_config() {
    let file = write_script("[results]\ncache = true\n");
    let config = Config::load_from_file(file.path()).unwrap();
    assert!(config.results.cache);

    let steps = sqllab::replay::parse_script(
        r#"[
            {"step": "open_editor", "id": "e1", "title": "Untitled", "sql": "SELECT a FROM t"},
            {"step": "run", "editor": "e1"},
            {"step": "notify", "editor": "e1", "event": {
                "type": "succeeded",
                "results_key": "k1",
                "results": {"columns": [{"name": "a"}], "data": [{"a": 1}, {"a": 2}]}
            }},
            {"step": "observe", "editor": "e1"},
            {"step": "observe", "editor": "e1"},
            {"step": "discard", "editor": "e1"},
            {"step": "observe", "editor": "e1"}
        ]"#,
    )
    .unwrap();

    let reports = tokio_test::block_on(async {
        let session = Session::new(
            &config,
            Arc::new(RecordingBackend::new()),
            Arc::new(RecordingStore::new()),
        )
        .unwrap();
        let (handle, _task) = spawn(session);
        run_script(&handle, steps).await
    })
    .unwrap();

    let text = render_text(&reports);
    assert!(text.contains("[4] observe: table [a] 2 rows"));
    assert!(text.contains("[5] observe: table [a] 2 rows"));
    assert!(text.contains("[6] discard: discarded"));
    assert!(text.contains("[7] observe: no query"));
}

#[test]
fn test_missing_script_is_a_script_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_script(&dir.path().join("missing.json")).unwrap_err();
    assert_eq!(err.category(), "Script Error");
}
