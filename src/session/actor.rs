//! Actor that owns a [`Session`] and processes commands one at a time.
//!
//! Backend notifications, user commands and render requests all go through
//! one channel, so no two of them ever touch a query concurrently.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ActionOutcome, Session};
use crate::editor::{DatabaseInfo, QueryEditor};
use crate::error::{Result, SqlLabError};
use crate::history::{HistoryFilter, HistoryRow};
use crate::presenter::{Action, Presentation};
use crate::query::{Notification, QueryId, StopOutcome, TransitionOutcome};

const CHANNEL_CAPACITY: usize = 64;

/// Commands sent to the session actor.
pub enum SessionCommand {
    AddDatabase {
        database: DatabaseInfo,
        reply: oneshot::Sender<()>,
    },
    OpenEditor {
        editor: QueryEditor,
        reply: oneshot::Sender<Result<Option<QueryId>>>,
    },
    UpdateEditor {
        editor_id: String,
        update: Box<dyn FnOnce(&mut QueryEditor) + Send>,
        reply: oneshot::Sender<Result<()>>,
    },
    Run {
        editor_id: String,
        run_async: bool,
        reply: oneshot::Sender<Result<Option<QueryId>>>,
    },
    CreateTableAs {
        editor_id: String,
        reply: oneshot::Sender<Result<Option<QueryId>>>,
    },
    Stop {
        editor_id: String,
        reply: oneshot::Sender<Result<Option<StopOutcome>>>,
    },
    /// A backend or result store notification.
    Notify {
        notification: Notification,
        reply: oneshot::Sender<TransitionOutcome>,
    },
    Observe {
        editor_id: String,
        reply: oneshot::Sender<Result<Option<Presentation>>>,
    },
    Perform {
        action: Action,
        reply: oneshot::Sender<Result<ActionOutcome>>,
    },
    LatestQuery {
        editor_id: String,
        reply: oneshot::Sender<Option<QueryId>>,
    },
    Discard {
        query_id: QueryId,
        reply: oneshot::Sender<bool>,
    },
    CloseEditor {
        editor_id: String,
        reply: oneshot::Sender<Result<usize>>,
    },
    History {
        filter: HistoryFilter,
        reply: oneshot::Sender<Vec<HistoryRow>>,
    },
    /// Stop the actor and hand back the session.
    Shutdown,
}

/// The session actor.
pub struct SessionActor {
    session: Session,
    receiver: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionActor {
    /// Creates a new actor and returns a handle for communication.
    pub fn new(session: Session) -> (SessionHandle, Self) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let actor = Self {
            session,
            receiver,
            cancel: cancel.clone(),
        };
        (SessionHandle { sender, cancel }, actor)
    }

    /// Processes commands until shutdown, cancellation or every handle is
    /// dropped, then returns the session.
    pub async fn run(mut self) -> Session {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                cmd = self.receiver.recv() => match cmd {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(cmd) => self.dispatch(cmd),
                },
            }
        }
        debug!("Session actor stopped");
        self.session
    }

    fn dispatch(&mut self, cmd: SessionCommand) {
        let session = &mut self.session;
        // A dropped reply receiver only means the caller stopped waiting
        match cmd {
            SessionCommand::AddDatabase { database, reply } => {
                session.add_database(database);
                let _ = reply.send(());
            }
            SessionCommand::OpenEditor { editor, reply } => {
                let _ = reply.send(session.open_editor(editor));
            }
            SessionCommand::UpdateEditor {
                editor_id,
                update,
                reply,
            } => {
                let _ = reply.send(session.editor_mut(&editor_id).map(update));
            }
            SessionCommand::Run {
                editor_id,
                run_async,
                reply,
            } => {
                let _ = reply.send(session.run_editor(&editor_id, run_async));
            }
            SessionCommand::CreateTableAs { editor_id, reply } => {
                let _ = reply.send(session.create_table_as(&editor_id));
            }
            SessionCommand::Stop { editor_id, reply } => {
                let _ = reply.send(session.stop_editor(&editor_id));
            }
            SessionCommand::Notify {
                notification,
                reply,
            } => {
                let _ = reply.send(session.handle(&notification));
            }
            SessionCommand::Observe { editor_id, reply } => {
                let _ = reply.send(session.observe_editor(&editor_id));
            }
            SessionCommand::Perform { action, reply } => {
                let _ = reply.send(session.perform(&action));
            }
            SessionCommand::LatestQuery { editor_id, reply } => {
                let latest = session.latest_query(&editor_id).map(|q| q.id.clone());
                let _ = reply.send(latest);
            }
            SessionCommand::Discard { query_id, reply } => {
                let _ = reply.send(session.discard(&query_id));
            }
            SessionCommand::CloseEditor { editor_id, reply } => {
                let _ = reply.send(session.close_editor(&editor_id));
            }
            SessionCommand::History { filter, reply } => {
                let _ = reply.send(session.history(&filter));
            }
            SessionCommand::Shutdown => {}
        }
    }
}

/// Spawns the actor on the current runtime.
pub fn spawn(session: Session) -> (SessionHandle, JoinHandle<Session>) {
    let (handle, actor) = SessionActor::new(session);
    (handle, tokio::spawn(actor.run()))
}

/// Cloneable handle for talking to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| SqlLabError::internal("session actor has stopped"))?;
        response
            .await
            .map_err(|_| SqlLabError::internal("session actor dropped the reply"))
    }

    pub async fn add_database(&self, database: DatabaseInfo) -> Result<()> {
        self.request(|reply| SessionCommand::AddDatabase { database, reply })
            .await
    }

    pub async fn open_editor(&self, editor: QueryEditor) -> Result<Option<QueryId>> {
        self.request(|reply| SessionCommand::OpenEditor { editor, reply })
            .await?
    }

    /// Applies `update` to an open editor.
    pub async fn update_editor(
        &self,
        editor_id: impl Into<String>,
        update: impl FnOnce(&mut QueryEditor) + Send + 'static,
    ) -> Result<()> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::UpdateEditor {
            editor_id,
            update: Box::new(update),
            reply,
        })
        .await?
    }

    pub async fn run(&self, editor_id: impl Into<String>, run_async: bool) -> Result<Option<QueryId>> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::Run {
            editor_id,
            run_async,
            reply,
        })
        .await?
    }

    pub async fn create_table_as(&self, editor_id: impl Into<String>) -> Result<Option<QueryId>> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::CreateTableAs { editor_id, reply })
            .await?
    }

    pub async fn stop(&self, editor_id: impl Into<String>) -> Result<Option<StopOutcome>> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::Stop { editor_id, reply })
            .await?
    }

    /// Delivers a backend or result store notification.
    pub async fn notify(&self, notification: Notification) -> Result<TransitionOutcome> {
        self.request(|reply| SessionCommand::Notify {
            notification,
            reply,
        })
        .await
    }

    /// Renders the result pane of an editor's latest query.
    pub async fn observe(&self, editor_id: impl Into<String>) -> Result<Option<Presentation>> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::Observe { editor_id, reply })
            .await?
    }

    pub async fn perform(&self, action: Action) -> Result<ActionOutcome> {
        self.request(|reply| SessionCommand::Perform { action, reply })
            .await?
    }

    pub async fn latest_query(&self, editor_id: impl Into<String>) -> Result<Option<QueryId>> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::LatestQuery { editor_id, reply })
            .await
    }

    pub async fn discard(&self, query_id: QueryId) -> Result<bool> {
        self.request(|reply| SessionCommand::Discard { query_id, reply })
            .await
    }

    pub async fn close_editor(&self, editor_id: impl Into<String>) -> Result<usize> {
        let editor_id = editor_id.into();
        self.request(|reply| SessionCommand::CloseEditor { editor_id, reply })
            .await?
    }

    pub async fn history(&self, filter: HistoryFilter) -> Result<Vec<HistoryRow>> {
        self.request(|reply| SessionCommand::History { filter, reply })
            .await
    }

    /// Asks the actor to stop after the commands already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SqlLabError::internal("session actor has stopped"))
    }

    /// Stops the actor without draining queued commands.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
