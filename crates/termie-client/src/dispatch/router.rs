use std::sync::Arc;

use termie_core::protocol::push::{Inbound, MemberRecord, MessageEvent};

use crate::events::ClientEvent;
use crate::model::{Author, Member, Message};
use crate::session::StateStore;

/// Applies one session's push events to its state and builds the application event.
///
/// Only the session's event loop calls `route`, so the store sees a single writer. The
/// loop delivers the returned event to the shared stream.
#[derive(Clone)]
pub struct EventRouter {
    store: Arc<StateStore>,
}

impl EventRouter {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Apply `inbound`; `None` when it produces no application event.
    pub async fn route(&self, inbound: Inbound) -> Option<ClientEvent> {
        match inbound {
            Inbound::MemberConnect(record) => {
                Some(ClientEvent::MemberConnect(self.member_connect(&record).await))
            }
            Inbound::MemberDisconnect(record) => {
                Some(ClientEvent::MemberDisconnect(self.member_disconnect(&record).await))
            }
            Inbound::Message(ev) => Some(ClientEvent::Message(self.resolve_message(ev).await)),
            // handshake results are one-shot and already consumed during login
            Inbound::MethodResult(_) | Inbound::AuthResult(_) => {
                tracing::trace!(session = %self.store.session(), event = inbound.name(), "late handshake event ignored");
                None
            }
            Inbound::Other(name) => {
                tracing::trace!(session = %self.store.session(), event = %name, "unhandled event");
                None
            }
        }
    }

    /// Stored instance for the connecting member (inserted if unseen).
    pub async fn member_connect(&self, record: &MemberRecord) -> Arc<Member> {
        let (member, inserted) = self.store.upsert_member(record).await;
        tracing::debug!(session = %self.store.session(), id = %record.id, inserted, "member connect");
        member
    }

    /// Removed instance, or a transient one built from the payload on a miss.
    pub async fn member_disconnect(&self, record: &MemberRecord) -> Arc<Member> {
        match self.store.remove_member(&record.id).await {
            Some(member) => {
                tracing::debug!(session = %self.store.session(), id = %record.id, "member disconnect");
                member
            }
            None => {
                tracing::debug!(session = %self.store.session(), id = %record.id, "disconnect for unknown member");
                Arc::new(Member::from_record(record, self.store.session().clone()))
            }
        }
    }

    pub async fn resolve_message(&self, ev: MessageEvent) -> Message {
        let user = if ev.is_server { None } else { ev.user_id.as_ref() };
        let (member, channel) = self.store.lookup(user, ev.channel.as_deref()).await;

        let author = if ev.is_server {
            Author::Server
        } else {
            match member {
                Some(m) => Author::Member(m),
                None => Author::Unknown(ev.user_id.clone()),
            }
        };

        Message {
            content: ev.content,
            author,
            channel,
            channel_name: ev.channel,
            id: ev.id,
            is_server_message: ev.is_server,
            session: self.store.session().clone(),
        }
    }
}
