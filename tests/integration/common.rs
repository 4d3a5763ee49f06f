//! Shared fixtures.

use std::sync::Arc;

use sqllab::backend::{RecordingBackend, RecordingStore};
use sqllab::config::Config;
use sqllab::editor::{DatabaseInfo, QueryEditor};
use sqllab::query::{row, ColumnInfo, QueryResults};
use sqllab::session::Session;

pub const EDITOR: &str = "e1";

/// A session with one database and one editor holding `SELECT a FROM t`.
pub struct Harness {
    pub backend: Arc<RecordingBackend>,
    pub store: Arc<RecordingStore>,
    pub session: Session,
}

impl Harness {
    pub fn new(cache: bool) -> Self {
        let mut config = Config::default();
        config.results.cache = cache;
        Self::with_config(&config)
    }

    pub fn with_config(config: &Config) -> Self {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(RecordingStore::new());
        let mut session = Session::new(config, backend.clone(), store.clone()).unwrap();
        session.add_database(DatabaseInfo {
            id: 1,
            name: "examples".to_string(),
            allow_run_sync: true,
            allow_ctas: true,
        });
        session
            .open_editor(
                QueryEditor::new(EDITOR, "Untitled")
                    .with_db(1)
                    .with_sql("SELECT a FROM t"),
            )
            .unwrap();
        Self {
            backend,
            store,
            session,
        }
    }
}

/// One column `a`, one row `{a: 1}`.
pub fn one_row() -> QueryResults {
    QueryResults::new(vec![ColumnInfo::named("a")], vec![row([("a", 1)])])
}
