//! Per-session channel/member state.
//!
//! Two mutation paths exist: wholesale replacement (bulk fetch) and in-place
//! upsert/remove (push events). Both are driven from the session's single writer;
//! readers may take snapshots at any time.

use std::sync::Arc;

use tokio::sync::RwLock;

use termie_core::error::{Result, TermieError};
use termie_core::protocol::push::{BotIdentity, MemberRecord};
use termie_core::protocol::rest::MemberEntry;
use termie_core::Id;

use crate::model::{Channel, ChannelMap, Member, MemberKey, MemberMap, SessionKey};

pub struct StateStore {
    session: SessionKey,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    identity: Option<BotIdentity>,
    channels: ChannelMap,
    members: MemberMap,
}

impl StateStore {
    pub fn new(session: SessionKey) -> Self {
        Self {
            session,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    pub async fn set_identity(&self, bot: BotIdentity) {
        self.inner.write().await.identity = Some(bot);
    }

    pub async fn identity(&self) -> Option<BotIdentity> {
        self.inner.read().await.identity.clone()
    }

    /// Fresh channel collection tagged with this session.
    pub fn build_channels(&self, names: Vec<String>) -> ChannelMap {
        names
            .into_iter()
            .map(|name| {
                let channel = Arc::new(Channel::new(name.clone(), self.session.clone()));
                (name, channel)
            })
            .collect()
    }

    /// Fresh member collection. Records without an id collapse into one Lurkers entry.
    pub fn build_members(&self, entries: Vec<MemberEntry>) -> MemberMap {
        let mut members = MemberMap::with_capacity(entries.len());
        for entry in entries {
            let member = match entry {
                MemberEntry::Member(record) => Member::from_record(&record, self.session.clone()),
                MemberEntry::Lurkers { lurkers } => Member::lurkers(lurkers, self.session.clone()),
            };
            members.insert(member.key(), Arc::new(member));
        }
        members
    }

    pub async fn replace_channels(&self, channels: ChannelMap) -> Result<()> {
        let mut inner = self.inner.write().await;
        ensure_authenticated(&inner, &self.session)?;
        inner.channels = channels;
        Ok(())
    }

    pub async fn replace_members(&self, members: MemberMap) -> Result<()> {
        let mut inner = self.inner.write().await;
        ensure_authenticated(&inner, &self.session)?;
        inner.members = members;
        Ok(())
    }

    /// Stored member for `record.id`, inserting it first if unseen.
    /// The flag is true when an insert happened.
    pub async fn upsert_member(&self, record: &MemberRecord) -> (Arc<Member>, bool) {
        let key = MemberKey::Id(record.id.clone());
        let mut inner = self.inner.write().await;
        if let Some(found) = inner.members.get(&key) {
            return (Arc::clone(found), false);
        }
        let member = Arc::new(Member::from_record(record, self.session.clone()));
        inner.members.insert(key, Arc::clone(&member));
        (member, true)
    }

    pub async fn remove_member(&self, id: &Id) -> Option<Arc<Member>> {
        self.inner
            .write()
            .await
            .members
            .remove(&MemberKey::Id(id.clone()))
    }

    pub async fn member(&self, key: &MemberKey) -> Option<Arc<Member>> {
        self.inner.read().await.members.get(key).cloned()
    }

    pub async fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.inner.read().await.channels.get(name).cloned()
    }

    /// Member and channel lookups under one read lock.
    pub async fn lookup(
        &self,
        user: Option<&Id>,
        channel: Option<&str>,
    ) -> (Option<Arc<Member>>, Option<Arc<Channel>>) {
        let inner = self.inner.read().await;
        let member = user.and_then(|id| inner.members.get(&MemberKey::Id(id.clone())).cloned());
        let channel = channel.and_then(|name| inner.channels.get(name).cloned());
        (member, channel)
    }

    pub async fn channels(&self) -> ChannelMap {
        self.inner.read().await.channels.clone()
    }

    pub async fn members(&self) -> MemberMap {
        self.inner.read().await.members.clone()
    }

    pub async fn member_count(&self) -> usize {
        self.inner.read().await.members.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.inner.read().await.channels.len()
    }
}

fn ensure_authenticated(inner: &StoreInner, session: &SessionKey) -> Result<()> {
    if inner.identity.is_none() {
        return Err(TermieError::InvalidState(format!(
            "session {session} has no identity yet; state cannot be populated"
        )));
    }
    Ok(())
}
