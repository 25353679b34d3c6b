//! Entities handed to application code.
//!
//! Every entity carries the key of the session that produced it; nothing is shared
//! across sessions. Stored entities live behind `Arc`, so repeated lookups of the same
//! member can be compared with `Arc::ptr_eq`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use termie_core::protocol::push::MemberRecord;
use termie_core::Id;

/// Reserved key of the anonymous-observer aggregate.
pub const LURKERS_KEY: &str = "Lurkers";

/// Identity of a session inside the registry (`host:port`, or `host:port#N`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        SessionKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub session: SessionKey,
}

impl Channel {
    pub fn new(name: impl Into<String>, session: SessionKey) -> Self {
        Self {
            name: name.into(),
            session,
        }
    }
}

/// Key of the member collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Id(Id),
    Lurkers,
}

impl From<Id> for MemberKey {
    fn from(id: Id) -> Self {
        MemberKey::Id(id)
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Id(id) => id.fmt(f),
            MemberKey::Lurkers => f.write_str(LURKERS_KEY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub uid: String,
    /// `None` only for the Lurkers aggregate.
    pub id: Option<Id>,
    pub username: String,
    pub tag: String,
    pub bot: bool,
    pub admin: bool,
    /// Observer count, set only on the Lurkers aggregate.
    pub lurkers: Option<u64>,
    pub session: SessionKey,
}

impl Member {
    pub fn from_record(record: &MemberRecord, session: SessionKey) -> Self {
        Self {
            uid: record.uid.clone(),
            id: Some(record.id.clone()),
            username: record.username.clone(),
            tag: record.tag.clone(),
            bot: record.bot,
            admin: record.admin,
            lurkers: None,
            session,
        }
    }

    pub fn lurkers(count: u64, session: SessionKey) -> Self {
        Self {
            uid: LURKERS_KEY.to_owned(),
            id: None,
            username: LURKERS_KEY.to_owned(),
            tag: String::new(),
            bot: false,
            admin: false,
            lurkers: Some(count),
            session,
        }
    }

    pub fn key(&self) -> MemberKey {
        match &self.id {
            Some(id) => MemberKey::Id(id.clone()),
            None => MemberKey::Lurkers,
        }
    }

    pub fn is_lurkers(&self) -> bool {
        self.id.is_none()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            f.write_str(&self.username)
        } else {
            write!(f, "{}#{}", self.username, self.tag)
        }
    }
}

pub type ChannelMap = HashMap<String, Arc<Channel>>;
pub type MemberMap = HashMap<MemberKey, Arc<Member>>;

/// Who wrote a message.
#[derive(Debug, Clone)]
pub enum Author {
    /// The server itself; never a member.
    Server,
    Member(Arc<Member>),
    /// A user id not present in the member collection.
    Unknown(Option<Id>),
}

impl Author {
    pub fn member(&self) -> Option<&Arc<Member>> {
        match self {
            Author::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Author::Server)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::Server => f.write_str("Server"),
            Author::Member(m) => m.fmt(f),
            Author::Unknown(Some(id)) => write!(f, "unknown({id})"),
            Author::Unknown(None) => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub content: String,
    pub author: Author,
    /// Resolved channel, when it is in the channel collection.
    pub channel: Option<Arc<Channel>>,
    /// Channel name as sent by the server.
    pub channel_name: Option<String>,
    pub id: Option<Id>,
    pub is_server_message: bool,
    pub session: SessionKey,
}
