//! Application-visible events and the shared fan-in stream.
//!
//! Every session writes into one bounded mpsc channel; the application owns the single
//! receiver. Push events are sent with `emit`, which waits for a free slot, so a slow
//! consumer slows the session loops down instead of dropping presence changes.
//! Login-phase events (`Ready`, bulk sync errors) go through `post`, which never waits:
//! a caller that only drains the stream after `login()` returns must not stall login.

use std::sync::Arc;

use tokio::sync::mpsc;

use termie_core::TermieError;

use crate::model::{Member, Message, SessionKey};

#[derive(Debug)]
pub enum ClientEvent {
    /// Every registered session reached Ready. Emitted once.
    Ready,
    /// Non-fatal failure in one session (e.g. a bulk fetch during login).
    Error { session: SessionKey, error: TermieError },
    Message(Message),
    MemberConnect(Arc<Member>),
    MemberDisconnect(Arc<Member>),
}

pub type EventStream = mpsc::Receiver<ClientEvent>;

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn emit(&self, event: ClientEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::trace!("event stream dropped; event discarded");
        }
    }

    /// Queue without waiting. On a full stream the send is handed to a detached task,
    /// so delivery is kept but may land after events emitted later.
    pub fn post(&self, event: ClientEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::debug!("event stream full; delivery deferred");
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(event).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!("event stream dropped; event discarded");
            }
        }
    }

    /// Report a non-fatal session failure; never waits.
    pub fn error(&self, session: &SessionKey, error: TermieError) {
        tracing::warn!(session = %session, code = error.code().as_str(), error = %error, "session error");
        self.post(ClientEvent::Error {
            session: session.clone(),
            error,
        });
    }
}
