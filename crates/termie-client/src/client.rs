//! Application-facing client: one registry of sessions, one event stream.

use std::sync::Arc;

use tokio::task::JoinSet;

use termie_core::error::{Result, TermieError};

use crate::config::{ClientConfig, LoginOptions};
use crate::events::{ClientEvent, EventSink, EventStream};
use crate::model::{Author, Channel, Message};
use crate::registry::{ReadyBarrier, SessionRegistry};
use crate::session::Session;
use crate::transport::{PushConnector, WsConnector};

pub struct Client {
    login: LoginOptions,
    registry: SessionRegistry,
    barrier: Arc<ReadyBarrier>,
    sink: EventSink,
}

impl Client {
    /// Client over WebSocket push channels.
    pub fn new(cfg: &ClientConfig) -> Result<(Self, EventStream)> {
        Self::with_connector(cfg, Arc::new(WsConnector::new()))
    }

    pub fn with_connector(
        cfg: &ClientConfig,
        connector: Arc<dyn PushConnector>,
    ) -> Result<(Self, EventStream)> {
        cfg.validate()?;
        let (sink, events) = EventSink::channel(cfg.events.queue_capacity);

        let mut registry = SessionRegistry::new();
        for server in &cfg.servers {
            registry.register(server, Arc::clone(&connector), sink.clone())?;
        }
        let barrier = Arc::new(ReadyBarrier::new(registry.len()));

        Ok((
            Self {
                login: cfg.login.clone(),
                registry,
                barrier,
                sink,
            },
            events,
        ))
    }

    /// Log every session in with the configured options.
    pub async fn login(&self) -> Result<()> {
        let opts = self.login.clone();
        self.login_with(&opts).await
    }

    /// Log every session in concurrently.
    ///
    /// Resolves after all sessions are Ready (and `ClientEvent::Ready` was emitted), or
    /// with the first session failure. Sessions still logging in keep going.
    pub async fn login_with(&self, opts: &LoginOptions) -> Result<()> {
        opts.validate()?;

        let mut tasks = JoinSet::new();
        for session in self.registry.sessions() {
            let opts = opts.clone();
            let barrier = Arc::clone(&self.barrier);
            let sink = self.sink.clone();
            tasks.spawn(async move {
                session.login(&opts).await?;
                if barrier.arrive(session.key()) {
                    tracing::info!(sessions = barrier.expected(), "all sessions ready");
                    sink.post(ClientEvent::Ready);
                }
                Ok::<_, TermieError>(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| TermieError::Internal(format!("login task failed: {e}")));
            if let Err(e) = outcome.and_then(|r| r) {
                tasks.detach_all();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn session(&self, key: &str) -> Option<Session> {
        self.registry.get(key)
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.registry.sessions()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Send to a channel through the session that owns it.
    pub async fn send(&self, channel: &Channel, content: &str) -> Result<Message> {
        self.owner(channel.session.as_str())?
            .send_message(&channel.name, content)
            .await
    }

    /// Answer a message where it came from: its channel, else its author directly.
    pub async fn reply(&self, msg: &Message, content: &str) -> Result<Message> {
        let session = self.owner(msg.session.as_str())?;
        if let Some(channel) = &msg.channel_name {
            return session.send_message(channel, content).await;
        }
        match &msg.author {
            Author::Member(member) => match &member.id {
                Some(id) => session.send_direct(id, content).await,
                None => Err(TermieError::InvalidState("cannot reply to the Lurkers aggregate".into())),
            },
            Author::Unknown(Some(id)) => session.send_direct(id, content).await,
            Author::Server | Author::Unknown(None) => Err(TermieError::InvalidState(
                "message has neither a channel nor a reachable author".into(),
            )),
        }
    }

    fn owner(&self, key: &str) -> Result<Session> {
        self.registry
            .get(key)
            .ok_or_else(|| TermieError::NotFound(format!("no session {key}")))
    }
}
