//! Session registry: one session per configured server, in configuration order.
//!
//! Keys are `host:port`. A second entry with the same base gets `host:port#1`, the next
//! `host:port#2`, and so on; derivation depends only on the keys registered before it.

pub mod readiness;

use std::sync::Arc;

use dashmap::DashMap;

use termie_core::error::Result;

use crate::config::ServerConfig;
use crate::events::EventSink;
use crate::model::SessionKey;
use crate::session::Session;
use crate::transport::PushConnector;

pub use readiness::ReadyBarrier;

#[derive(Default)]
pub struct SessionRegistry {
    order: Vec<SessionKey>,
    sessions: DashMap<SessionKey, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register the session for `cfg` under a fresh key.
    pub fn register(
        &mut self,
        cfg: &ServerConfig,
        connector: Arc<dyn PushConnector>,
        sink: EventSink,
    ) -> Result<Session> {
        let key = SessionKey::new(dedupe_key(
            self.order.iter().map(SessionKey::as_str),
            &cfg.base_key(),
        ));
        let session = Session::new(key.clone(), cfg, connector, sink)?;
        tracing::debug!(session = %key, "session registered");
        self.order.push(key.clone());
        self.sessions.insert(key, session.clone());
        Ok(session)
    }

    pub fn get(&self, key: &str) -> Option<Session> {
        self.sessions
            .get(&SessionKey::new(key))
            .map(|r| r.value().clone())
    }

    /// Sessions in registration order.
    pub fn sessions(&self) -> Vec<Session> {
        self.order
            .iter()
            .filter_map(|k| self.sessions.get(k).map(|r| r.value().clone()))
            .collect()
    }

    pub fn keys(&self) -> &[SessionKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// `base` if unused, else `base#N` where N counts the keys already derived from `base`.
pub fn dedupe_key<'a>(existing: impl Iterator<Item = &'a str>, base: &str) -> String {
    let suffixed = format!("{base}#");
    let taken = existing
        .filter(|k| *k == base || k.starts_with(&suffixed))
        .count();
    if taken == 0 {
        base.to_owned()
    } else {
        format!("{base}#{taken}")
    }
}

#[cfg(test)]
mod tests {
    use super::dedupe_key;

    #[test]
    fn suffixes_count_same_base_only() {
        let existing = ["http://a:1", "http://a:1#1", "http://a:10"];
        assert_eq!(dedupe_key(existing.iter().copied(), "http://a:1"), "http://a:1#2");
        assert_eq!(dedupe_key(existing.iter().copied(), "http://a:10"), "http://a:10#1");
        assert_eq!(dedupe_key(existing.iter().copied(), "http://b:1"), "http://b:1");
    }
}
