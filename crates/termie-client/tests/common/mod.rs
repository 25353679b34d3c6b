#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use termie_client::config::{LoginOptions, ServerConfig};
use termie_client::events::{ClientEvent, EventSink, EventStream};
use termie_client::model::SessionKey;
use termie_client::session::Session;
use termie_client::transport::{MemoryConnector, MemoryPeer, PushConnector};
use termie_core::protocol::push::events;

pub const TOKEN: &str = "tok-1";
pub const SESSION_ID: &str = "sess-1";
pub const BOT_ID: u64 = 1592504435448;

/// Quick options: no delay between attempts, short timeouts.
pub fn fast_login(attempts: u32) -> LoginOptions {
    LoginOptions {
        reconnection_attempts: attempts,
        reconnection_delay_ms: 0,
        timeout_ms: 2000,
    }
}

/// Server config pointing at the mock HTTP server.
pub fn server_config(http: &ServerGuard, token: &str) -> ServerConfig {
    let (host, port) = split_host(http);
    ServerConfig::new(format!("http://{host}"), port, token)
}

pub fn split_host(http: &ServerGuard) -> (String, u16) {
    let hp = http.host_with_port();
    let (host, port) = hp.rsplit_once(':').expect("host:port");
    (host.to_owned(), port.parse().expect("port"))
}

pub struct Harness {
    pub session: Session,
    pub connector: Arc<MemoryConnector>,
    pub peers: mpsc::UnboundedReceiver<MemoryPeer>,
    pub events: EventStream,
}

pub fn harness(cfg: &ServerConfig) -> Harness {
    harness_with_capacity(cfg, 64)
}

/// Harness whose event stream holds at most `capacity` undelivered events.
pub fn harness_with_capacity(cfg: &ServerConfig, capacity: usize) -> Harness {
    let (connector, peers) = MemoryConnector::new();
    let connector = Arc::new(connector);
    let dyn_connector: Arc<dyn PushConnector> = connector.clone();
    let (sink, events) = EventSink::channel(capacity);
    let session = Session::new(SessionKey::new(cfg.base_key()), cfg, dyn_connector, sink).expect("session");
    Harness {
        session,
        connector,
        peers,
        events,
    }
}

pub fn auth_ok() -> Value {
    json!({
        "success": true,
        "bot": {
            "uid": "termiebot",
            "id": BOT_ID,
            "username": "Termie",
            "tag": "0001",
            "sessionID": SESSION_ID
        }
    })
}

pub fn auth_rejected() -> Value {
    json!({ "success": false, "message": "Invalid token", "type": "invalidToken" })
}

/// Accept the connection, expect `login` with `token`, answer with `auth`.
pub async fn handshake(peer: &mut MemoryPeer, token: &str, auth: Value) {
    assert!(peer.emit(events::METHOD_RESULT, json!({ "success": true })));
    let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
        .await
        .expect("login frame in time")
        .expect("login frame");
    assert_eq!(frame.event, events::LOGIN);
    assert_eq!(frame.data["token"], token);
    assert_eq!(frame.data["bot"], true);
    assert!(peer.emit(events::AUTH_RESULT, auth));
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
    tokio::time::timeout(Duration::from_secs(2), peers.recv())
        .await
        .expect("connection in time")
        .expect("connection")
}

pub async fn next_event(events: &mut EventStream) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event in time")
        .expect("event stream open")
}

/// Events already queued, waiting briefly for stragglers.
pub async fn drain(events: &mut EventStream) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(150), events.recv()).await {
        out.push(ev);
    }
    out
}

pub fn member_json(id: u64, uid: &str, bot: bool) -> Value {
    json!({ "uid": uid, "id": id, "username": uid, "tag": "0001", "bot": bot, "admin": false })
}

pub async fn mock_channels(http: &mut ServerGuard, names: &[&str]) -> Mock {
    http.mock("GET", "/channels")
        .match_query(Matcher::Exact(format!("sessionID={SESSION_ID}")))
        .match_header("authorization", format!("Bot {TOKEN}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "channels": names }).to_string())
        .create_async()
        .await
}

pub async fn mock_members(http: &mut ServerGuard, members: Value) -> Mock {
    http.mock("GET", "/members")
        .match_query(Matcher::Exact(format!("sessionID={SESSION_ID}")))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "members": members }).to_string())
        .create_async()
        .await
}

/// Two members plus four lurkers.
pub fn default_members() -> Value {
    json!([
        member_json(11, "alice", false),
        member_json(12, "helper", true),
        { "lurkers": 4 }
    ])
}
