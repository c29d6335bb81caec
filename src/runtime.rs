//! Session event loop
//!
//! One task owns the page and the session. Page edits, settings changes,
//! finished network requests and user commands are all handled here one at
//! a time, so session state is never touched concurrently. After every event
//! the loop drains the page's pending mutations into the session.

use crate::dom::Document;
use crate::error::MinutesError;
use crate::session::{MinutesReply, MinutesReport, Session, SessionInbox, SessionStatus};
use crate::settings::SettingsStore;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Edit applied to the page on the session loop
pub(crate) type PageEdit = Box<dyn FnOnce(&mut Document) + Send>;

/// Commands accepted by the session loop
pub(crate) enum Input {
    Page(PageEdit),
    GenerateMinutes(MinutesReply),
    Status(oneshot::Sender<SessionStatus>),
    /// Answered once no translation or minutes request is outstanding
    Settle(oneshot::Sender<()>),
    Shutdown,
}

/// Run the session loop until shut down. Returns the page.
pub(crate) async fn run(
    mut doc: Document,
    mut session: Session,
    mut inbox: SessionInbox,
    store: Arc<SettingsStore>,
    mut inputs: mpsc::Receiver<Input>,
) -> Document {
    let mut settings_rx = store.subscribe();
    let mut settle_waiters: Vec<oneshot::Sender<()>> = Vec::new();
    info!("Caption session started");

    loop {
        tokio::select! {
            biased;

            changed = settings_rx.recv() => match changed {
                Ok(change) => {
                    debug!(keys = ?change.keys, "Reloading settings");
                    session.on_settings_changed(&mut doc, store.load());
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Settings notifications lagged, reloading");
                    session.on_settings_changed(&mut doc, store.load());
                }
                Err(RecvError::Closed) => {
                    warn!("Settings store closed, stopping session");
                    break;
                }
            },

            Some(completion) = inbox.translations.recv() => {
                session.on_translation(&mut doc, completion);
            }

            Some(summary) = inbox.summaries.recv() => {
                session.on_summary(summary);
            }

            input = inputs.recv() => match input {
                Some(Input::Page(edit)) => edit(&mut doc),
                Some(Input::GenerateMinutes(reply)) => session.request_minutes(reply),
                Some(Input::Status(reply)) => {
                    let _ = reply.send(session.status());
                }
                Some(Input::Settle(reply)) => settle_waiters.push(reply),
                Some(Input::Shutdown) | None => break,
            },
        }

        let batch = doc.take_mutations();
        if !batch.is_empty() {
            session.on_mutations(&mut doc, &batch);
        }

        if session.is_idle() {
            for waiter in settle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    info!("Caption session stopped");
    doc
}

/// Cloneable handle to a running session loop
#[derive(Clone)]
pub(crate) struct SessionHandle {
    inputs: mpsc::Sender<Input>,
}

impl SessionHandle {
    /// Spawn the session loop on the current runtime
    pub(crate) fn spawn(
        doc: Document,
        session: Session,
        inbox: SessionInbox,
        store: Arc<SettingsStore>,
    ) -> (Self, JoinHandle<Document>) {
        let (inputs, rx) = mpsc::channel(64);
        let task = tokio::spawn(run(doc, session, inbox, store, rx));
        (Self { inputs }, task)
    }

    /// Run `edit` against the page. `None` if the loop has stopped.
    pub(crate) async fn edit_page<R, F>(&self, edit: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Document) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let page_edit: PageEdit = Box::new(move |doc| {
            let _ = tx.send(edit(doc));
        });
        self.inputs.send(Input::Page(page_edit)).await.ok()?;
        rx.await.ok()
    }

    /// Generate minutes and wait for the outcome
    pub(crate) async fn generate_minutes(&self) -> Result<MinutesReport, MinutesError> {
        let (tx, rx) = oneshot::channel();
        self.inputs
            .send(Input::GenerateMinutes(tx))
            .await
            .map_err(|_| MinutesError::SessionClosed)?;
        rx.await.map_err(|_| MinutesError::SessionClosed)?
    }

    pub(crate) async fn status(&self) -> Option<SessionStatus> {
        let (tx, rx) = oneshot::channel();
        self.inputs.send(Input::Status(tx)).await.ok()?;
        rx.await.ok()
    }

    /// Wait until every outstanding request has been applied.
    /// Returns false if the loop has stopped.
    pub(crate) async fn settle(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.inputs.send(Input::Settle(tx)).await.is_err() {
            return false;
        }
        rx.await.is_ok()
    }

    pub(crate) async fn shutdown(&self) {
        let _ = self.inputs.send(Input::Shutdown).await;
    }
}
