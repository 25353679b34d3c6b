//! One server session: connect/auth state machine and authoritative state owner.
//!
//! ```text
//! Idle -> Connecting -> Connected -> Authenticating -> Ready
//!            |              |              |
//!            +--------------+--------------+--> Failed (login may be retried)
//! ```
//!
//! After Ready, a single event-loop task owns the push channel. It applies push events
//! and queued committing refreshes one at a time, so a bulk replace never interleaves
//! with incremental updates.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::{sleep, timeout};
use tracing::Instrument;

use termie_core::error::{Result, TermieError};
use termie_core::protocol::push::{events, BotIdentity, Inbound, PushFrame};
use termie_core::protocol::rest::{ChannelList, FetchQuery, MemberList, Reply, SendMessageBody, SentMessage};
use termie_core::Id;

use crate::config::{LoginOptions, ServerConfig};
use crate::dispatch::EventRouter;
use crate::events::{ClientEvent, EventSink};
use crate::gateway::{GatewayRequest, RequestGateway, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
use crate::model::{Author, Channel, ChannelMap, Member, MemberKey, MemberMap, Message, SessionKey};
use crate::transport::{Endpoint, PushChannel, PushConnector};

use super::state::StateStore;

const COMMAND_QUEUE: usize = 16;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    /// Handshake accepted, not yet authenticated.
    Connected,
    Authenticating,
    Ready,
    Failed,
}

/// Committing refreshes queued to the event loop.
enum SyncCommand {
    Channels {
        reply: oneshot::Sender<Result<ChannelMap>>,
    },
    Members {
        channel: Option<String>,
        reply: oneshot::Sender<Result<MemberMap>>,
    },
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    key: SessionKey,
    endpoint: Endpoint,
    token: String,
    gateway: RequestGateway,
    connector: Arc<dyn PushConnector>,
    sink: EventSink,
    store: Arc<StateStore>,
    state: watch::Sender<SessionState>,
    commands: Mutex<Option<mpsc::Sender<SyncCommand>>>,
    login_gate: Mutex<()>,
}

impl Session {
    pub fn new(
        key: SessionKey,
        cfg: &ServerConfig,
        connector: Arc<dyn PushConnector>,
        sink: EventSink,
    ) -> Result<Self> {
        cfg.validate()?;
        let endpoint = Endpoint::from_config(cfg);
        let gateway = RequestGateway::new(endpoint.scheme())?;
        let (state, _) = watch::channel(SessionState::Idle);
        Ok(Self {
            inner: Arc::new(SessionInner {
                store: Arc::new(StateStore::new(key.clone())),
                key,
                endpoint,
                token: cfg.token.clone(),
                gateway,
                connector,
                sink,
                state,
                commands: Mutex::new(None),
                login_gate: Mutex::new(()),
            }),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.inner.key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    pub async fn identity(&self) -> Option<BotIdentity> {
        self.inner.store.identity().await
    }

    pub async fn channels(&self) -> ChannelMap {
        self.inner.store.channels().await
    }

    pub async fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.inner.store.channel(name).await
    }

    pub async fn members(&self) -> MemberMap {
        self.inner.store.members().await
    }

    pub async fn member(&self, key: &MemberKey) -> Option<Arc<Member>> {
        self.inner.store.member(key).await
    }

    /// Resolves once the session is Ready; errors if it ends up Failed.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|s| matches!(s, SessionState::Ready | SessionState::Failed))
            .await
            .map_err(|_| TermieError::Internal("session state dropped".into()))?;
        match state {
            SessionState::Ready => Ok(()),
            _ => Err(TermieError::InvalidState(format!("session {} failed", self.inner.key))),
        }
    }

    fn set_state(&self, state: SessionState) {
        let prev = self.inner.state.send_replace(state);
        if prev != state {
            tracing::debug!(session = %self.inner.key, from = ?prev, to = ?state, "session state");
        }
    }

    // --------------------
    // Connect / login
    // --------------------

    /// Open the push channel and wait for the one handshake result.
    pub async fn connect(&self, opts: &LoginOptions) -> Result<Box<dyn PushChannel>> {
        let endpoint = &self.inner.endpoint;
        let attempts = opts.reconnection_attempts.max(1);
        let mut failed = 0u32;
        self.set_state(SessionState::Connecting);

        let mut channel = loop {
            match timeout(opts.timeout(), self.inner.connector.open(endpoint)).await {
                Ok(Ok(channel)) => break channel,
                Ok(Err(e)) => {
                    tracing::warn!(session = %self.inner.key, attempt = failed + 1, error = %e, "connect attempt failed")
                }
                Err(_) => {
                    tracing::warn!(session = %self.inner.key, attempt = failed + 1, "connect attempt timed out")
                }
            }
            failed += 1;
            if failed >= attempts {
                self.set_state(SessionState::Failed);
                return Err(TermieError::no_connection(&endpoint.to_string(), attempts));
            }
            let delay = opts.reconnection_delay();
            if !delay.is_zero() {
                sleep(delay).await;
            }
        };

        let err = match timeout(opts.timeout(), await_event(&mut channel, events::METHOD_RESULT)).await {
            Ok(Ok(Inbound::MethodResult(res))) if res.success => {
                self.set_state(SessionState::Connected);
                return Ok(channel);
            }
            Ok(Ok(Inbound::MethodResult(res))) => TermieError::Connect {
                message: res.message.unwrap_or_else(|| "connection rejected".into()),
                kind: res.kind.unwrap_or_else(|| "rejected".into()),
            },
            Ok(Ok(other)) => TermieError::Protocol(format!("unexpected {} during handshake", other.name())),
            Ok(Err(e)) => e,
            Err(_) => TermieError::Connect {
                message: format!("no handshake result from {endpoint} within {}ms", opts.timeout_ms),
                kind: "timeout".into(),
            },
        };
        Err(self.abort(&mut channel, err).await)
    }

    /// Connect, authenticate, bulk sync, then start the event loop.
    pub async fn login(&self, opts: &LoginOptions) -> Result<()> {
        let _gate = self
            .inner
            .login_gate
            .try_lock()
            .map_err(|_| TermieError::InvalidState(format!("login already running for {}", self.inner.key)))?;
        match self.state() {
            SessionState::Idle | SessionState::Failed => {}
            other => {
                return Err(TermieError::InvalidState(format!(
                    "cannot login session {} from {other:?}",
                    self.inner.key
                )))
            }
        }

        let span = tracing::info_span!("session", key = %self.inner.key);
        self.login_inner(opts, span.clone()).instrument(span).await
    }

    async fn login_inner(&self, opts: &LoginOptions, span: tracing::Span) -> Result<()> {
        let mut channel = self.connect(opts).await?;
        self.set_state(SessionState::Authenticating);

        let frame = match PushFrame::login(&self.inner.token) {
            Ok(f) => f,
            Err(e) => return Err(self.abort(&mut channel, e).await),
        };
        if let Err(e) = channel.send(frame).await {
            return Err(self.abort(&mut channel, e).await);
        }

        // one-shot: only the next authResult counts
        let auth = match await_event(&mut channel, events::AUTH_RESULT).await {
            Ok(Inbound::AuthResult(res)) => res,
            Ok(other) => {
                let e = TermieError::Protocol(format!("unexpected {} during auth", other.name()));
                return Err(self.abort(&mut channel, e).await);
            }
            Err(e) => return Err(self.abort(&mut channel, e).await),
        };
        if !auth.success {
            let e = TermieError::Auth {
                message: auth.message.unwrap_or_else(|| "authentication rejected".into()),
                kind: auth.kind.unwrap_or_else(|| "rejected".into()),
            };
            return Err(self.abort(&mut channel, e).await);
        }
        let Some(bot) = auth.bot else {
            let e = TermieError::Protocol("authResult without bot identity".into());
            return Err(self.abort(&mut channel, e).await);
        };
        tracing::info!(uid = %bot.uid, id = %bot.id, "authenticated");
        self.inner.store.set_identity(bot).await;

        // bulk sync failures are reported, not fatal
        if let Err(e) = self.sync_channels().await {
            self.inner.sink.error(&self.inner.key, e);
        }
        if let Err(e) = self.sync_members(None).await {
            self.inner.sink.error(&self.inner.key, e);
        }

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        *self.inner.commands.lock().await = Some(tx);
        let router = EventRouter::new(Arc::clone(&self.inner.store));
        tokio::spawn(run_loop(self.clone(), channel, router, rx).instrument(span));

        self.set_state(SessionState::Ready);
        let channels = self.inner.store.channel_count().await;
        let members = self.inner.store.member_count().await;
        tracing::info!(channels, members, "session ready");
        Ok(())
    }

    async fn abort(&self, channel: &mut Box<dyn PushChannel>, err: TermieError) -> TermieError {
        channel.close().await;
        self.set_state(SessionState::Failed);
        tracing::warn!(session = %self.inner.key, code = err.code().as_str(), error = %err, "login failed");
        err
    }

    // --------------------
    // Bulk fetch
    // --------------------

    /// Refetch channels and replace the collection.
    pub async fn fetch_channels(&self) -> Result<ChannelMap> {
        let Some(tx) = self.command_sender().await else {
            return self.sync_channels().await;
        };
        let (reply, rx) = oneshot::channel();
        if tx.send(SyncCommand::Channels { reply }).await.is_err() {
            return self.sync_channels().await;
        }
        rx.await.map_err(|_| TermieError::ChannelClosed)?
    }

    /// Refetch members, optionally filtered by channel.
    ///
    /// `commit = true` replaces the authoritative collection. `commit = false` returns a
    /// detached snapshot and leaves session state untouched.
    pub async fn fetch_members(&self, channel: Option<&str>, commit: bool) -> Result<MemberMap> {
        if !commit {
            return self.request_members(channel).await;
        }
        let Some(tx) = self.command_sender().await else {
            return self.sync_members(channel).await;
        };
        let (reply, rx) = oneshot::channel();
        let cmd = SyncCommand::Members {
            channel: channel.map(str::to_owned),
            reply,
        };
        if tx.send(cmd).await.is_err() {
            return self.sync_members(channel).await;
        }
        rx.await.map_err(|_| TermieError::ChannelClosed)?
    }

    async fn command_sender(&self) -> Option<mpsc::Sender<SyncCommand>> {
        self.inner.commands.lock().await.clone()
    }

    async fn apply(&self, cmd: SyncCommand) {
        match cmd {
            SyncCommand::Channels { reply } => {
                let _ = reply.send(self.sync_channels().await);
            }
            SyncCommand::Members { channel, reply } => {
                let _ = reply.send(self.sync_members(channel.as_deref()).await);
            }
        }
    }

    async fn sync_channels(&self) -> Result<ChannelMap> {
        let channels = self.request_channels().await?;
        self.inner.store.replace_channels(channels.clone()).await?;
        tracing::debug!(session = %self.inner.key, count = channels.len(), "channels replaced");
        Ok(channels)
    }

    async fn sync_members(&self, channel: Option<&str>) -> Result<MemberMap> {
        let members = self.request_members(channel).await?;
        self.inner.store.replace_members(members.clone()).await?;
        tracing::debug!(session = %self.inner.key, count = members.len(), "members replaced");
        Ok(members)
    }

    async fn request_channels(&self) -> Result<ChannelMap> {
        let identity = self.require_identity().await?;
        let query = FetchQuery {
            session_id: &identity.session_id,
            channel: None,
        };
        let req = self
            .request(Method::GET, "/channels")
            .header("Content-Type", CONTENT_TYPE_FORM)
            .body(to_body(&query)?);
        let list: ChannelList = self
            .inner
            .gateway
            .send(req)
            .await
            .and_then(Reply::decode)
            .map_err(|e| TermieError::GetChannels(e.into()))?;
        Ok(self.inner.store.build_channels(list.channels))
    }

    async fn request_members(&self, channel: Option<&str>) -> Result<MemberMap> {
        let identity = self.require_identity().await?;
        let query = FetchQuery {
            session_id: &identity.session_id,
            channel,
        };
        let req = self
            .request(Method::GET, "/members")
            .header("Content-Type", CONTENT_TYPE_FORM)
            .body(to_body(&query)?);
        let list: MemberList = self
            .inner
            .gateway
            .send(req)
            .await
            .and_then(Reply::decode)
            .map_err(|e| TermieError::GetMembers(e.into()))?;
        Ok(self.inner.store.build_members(list.members))
    }

    // --------------------
    // Send
    // --------------------

    /// Post a message to a channel; returns the message as stored by the server.
    pub async fn send_message(&self, channel: &str, content: &str) -> Result<Message> {
        let (sent, identity) = self.post_message(format!("/channels/{channel}"), content).await?;
        let (own, resolved) = self.inner.store.lookup(Some(&identity.id), Some(channel)).await;
        Ok(self.sent_message(sent, own, identity.id, resolved, Some(channel.to_owned())))
    }

    /// Post a direct message to one member.
    pub async fn send_direct(&self, member: &Id, content: &str) -> Result<Message> {
        let (sent, identity) = self.post_message(format!("/members/{member}"), content).await?;
        let (own, _) = self.inner.store.lookup(Some(&identity.id), None).await;
        Ok(self.sent_message(sent, own, identity.id, None, None))
    }

    async fn post_message(&self, path: String, content: &str) -> Result<(SentMessage, BotIdentity)> {
        let identity = self.require_identity().await?;
        let body = SendMessageBody {
            user_id: identity.id.clone(),
            uid: identity.uid.clone(),
            username: identity.username.clone(),
            tag: identity.tag.clone(),
            msg: content.to_owned(),
            session_id: identity.session_id.clone(),
        };
        let req = self
            .request(Method::POST, path)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(to_body(&body)?);
        let sent: SentMessage = self
            .inner
            .gateway
            .send(req)
            .await
            .and_then(Reply::decode)
            .map_err(|e| TermieError::SendMessage(e.into()))?;
        Ok((sent, identity))
    }

    fn sent_message(
        &self,
        sent: SentMessage,
        own: Option<Arc<Member>>,
        own_id: Id,
        channel: Option<Arc<Channel>>,
        channel_name: Option<String>,
    ) -> Message {
        Message {
            content: sent.message.msg,
            author: own.map_or(Author::Unknown(Some(own_id)), Author::Member),
            channel,
            channel_name,
            id: sent.message.id,
            is_server_message: false,
            session: self.inner.key.clone(),
        }
    }

    // --------------------
    // Helpers
    // --------------------

    fn request(&self, method: Method, path: impl Into<String>) -> GatewayRequest {
        GatewayRequest::new(method, self.inner.endpoint.hostname.clone(), self.inner.endpoint.port, path)
            .bot_auth(&self.inner.token)
    }

    async fn require_identity(&self) -> Result<BotIdentity> {
        self.inner.store.identity().await.ok_or_else(|| {
            TermieError::InvalidState(format!("session {} is not authenticated", self.inner.key))
        })
    }
}

/// Wait for the next event named `name`, dropping anything else in between.
async fn await_event(channel: &mut Box<dyn PushChannel>, name: &str) -> Result<Inbound> {
    loop {
        let frame = match channel.recv().await {
            Some(frame) => frame?,
            None => return Err(TermieError::ChannelClosed),
        };
        if frame.event != name {
            tracing::trace!(event = %frame.event, waiting_for = name, "event dropped before handshake");
            continue;
        }
        return Inbound::decode(frame);
    }
}

fn to_body<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| TermieError::Internal(format!("body encode failed: {e}")))
}

async fn run_loop(
    session: Session,
    mut channel: Box<dyn PushChannel>,
    router: EventRouter,
    mut commands: mpsc::Receiver<SyncCommand>,
) {
    let key = session.key().clone();
    let sink = session.inner.sink.clone();
    let ended = loop {
        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break None; };
                session.apply(cmd).await;
            }
            frame = channel.recv() => {
                let inbound = match frame {
                    Some(Ok(frame)) => Inbound::decode(frame),
                    Some(Err(e)) => break Some(e),
                    None => break Some(TermieError::ChannelClosed),
                };
                match inbound {
                    Ok(inbound) => {
                        if let Some(event) = router.route(inbound).await {
                            deliver(&session, &sink, &mut commands, event).await;
                        }
                    }
                    Err(e) => tracing::warn!(session = %key, error = %e, "push event dropped"),
                }
            }
        }
    };

    *session.inner.commands.lock().await = None;
    // refreshes queued after the channel ended still get an answer
    commands.close();
    while let Some(cmd) = commands.recv().await {
        session.apply(cmd).await;
    }
    channel.close().await;
    if let Some(e) = ended {
        sink.error(&key, e);
    }
    tracing::info!(session = %key, "event loop stopped");
}

/// Wait for stream capacity while still serving queued refreshes, so a consumer that
/// awaits a refresh before draining the stream cannot wedge the loop.
async fn deliver(
    session: &Session,
    sink: &EventSink,
    commands: &mut mpsc::Receiver<SyncCommand>,
    event: ClientEvent,
) {
    let send = sink.emit(event);
    tokio::pin!(send);
    loop {
        tokio::select! {
            biased;
            () = &mut send => return,
            Some(cmd) = commands.recv() => session.apply(cmd).await,
        }
    }
}
