#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use tokio::sync::{mpsc, Notify};

use common::*;
use termie_client::config::{ClientConfig, ServerConfig};
use termie_client::events::ClientEvent;
use termie_client::session::SessionState;
use termie_client::transport::{MemoryConnector, MemoryPeer};
use termie_client::Client;
use termie_core::error::ErrorCode;
use termie_core::protocol::push::events;

/// Accept every connection; auth succeeds unless the token is "bad". Peers stay open.
fn serve(peers: mpsc::UnboundedReceiver<MemoryPeer>) {
    serve_gated(peers, Arc::new(Notify::new()));
}

/// Like `serve`, but the auth result for token "slow" waits for `gate`.
fn serve_gated(mut peers: mpsc::UnboundedReceiver<MemoryPeer>, gate: Arc<Notify>) {
    tokio::spawn(async move {
        while let Some(mut peer) = peers.recv().await {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                peer.emit(events::METHOD_RESULT, serde_json::json!({ "success": true }));
                let Some(frame) = peer.recv().await else { return };
                let auth = match frame.data["token"].as_str() {
                    Some("bad") => auth_rejected(),
                    Some("slow") => {
                        gate.notified().await;
                        auth_ok()
                    }
                    _ => auth_ok(),
                };
                peer.emit(events::AUTH_RESULT, auth);
                while peer.recv().await.is_some() {}
            });
        }
    });
}

fn fast_config(servers: Vec<ServerConfig>) -> ClientConfig {
    let mut cfg = ClientConfig::with_servers(servers);
    cfg.login = fast_login(2);
    cfg
}

#[tokio::test]
async fn duplicate_servers_get_suffixed_keys() {
    let (connector, _peers) = MemoryConnector::new();
    let cfg = fast_config(vec![
        ServerConfig::new("http://localhost", 3000, "a"),
        ServerConfig::new("http://localhost", 3000, "b"),
        ServerConfig::new("http://localhost", 3001, "c"),
        ServerConfig::new("http://localhost", 3000, "d"),
    ]);

    let (client, _events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    let keys: Vec<String> = client.sessions().iter().map(|s| s.key().to_string()).collect();
    assert_eq!(
        keys,
        [
            "http://localhost:3000",
            "http://localhost:3000#1",
            "http://localhost:3001",
            "http://localhost:3000#2",
        ]
    );
    assert!(client.session("http://localhost:3000#1").is_some());
    assert!(client.session("http://localhost:3000#3").is_none());
}

#[tokio::test]
async fn ready_fires_once_after_every_session() {
    let mut http = mockito::Server::new_async().await;
    let _c = mock_channels(&mut http, &["general"]).await;
    let _m = mock_members(&mut http, default_members()).await;

    let (connector, peers) = MemoryConnector::new();
    serve(peers);
    let cfg = fast_config(vec![
        server_config(&http, TOKEN),
        server_config(&http, TOKEN),
        server_config(&http, TOKEN),
    ]);

    let (client, mut events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    client.login().await.expect("login");

    for session in client.sessions() {
        assert_eq!(session.state(), SessionState::Ready);
    }
    let ready = drain(&mut events)
        .await
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Ready))
        .count();
    assert_eq!(ready, 1);
}

#[tokio::test]
async fn first_failure_rejects_while_others_continue() {
    let mut http = mockito::Server::new_async().await;
    let _c = mock_channels(&mut http, &["general"]).await;
    let _m = mock_members(&mut http, default_members()).await;

    let (connector, peers) = MemoryConnector::new();
    serve(peers);
    let good = server_config(&http, TOKEN);
    let mut bad = server_config(&http, "bad");
    bad.port = bad.port.wrapping_add(1).max(1);
    let cfg = fast_config(vec![good.clone(), bad]);

    let (client, mut events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    let err = client.login().await.expect_err("must fail");
    assert_eq!(err.code(), ErrorCode::Auth);

    let survivor = client.session(&good.base_key()).expect("session");
    survivor.wait_ready().await.expect("survivor ready");

    let ready = drain(&mut events)
        .await
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Ready))
        .count();
    assert_eq!(ready, 0);
}

#[tokio::test]
async fn send_and_reply_route_through_the_owning_session() {
    let mut http = mockito::Server::new_async().await;
    let _c = mock_channels(&mut http, &["general"]).await;
    let _m = mock_members(&mut http, default_members()).await;
    let post = http
        .mock("POST", "/channels/general")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":{"msg":"pong","id":1}}"#)
        .expect(2)
        .create_async()
        .await;
    let direct = http
        .mock("POST", "/members/11")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":{"msg":"pong","id":2}}"#)
        .create_async()
        .await;

    let (connector, peers) = MemoryConnector::new();
    serve(peers);
    let cfg = fast_config(vec![server_config(&http, TOKEN)]);
    let (client, _events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    client.login().await.expect("login");

    let session = client.sessions().remove(0);
    let general = session.channel("general").await.expect("channel");
    let sent = client.send(&general, "pong").await.expect("send");
    assert_eq!(sent.content, "pong");

    // channel message: reply goes to the channel
    let reply = client.reply(&sent, "pong").await.expect("reply");
    assert_eq!(reply.channel_name.as_deref(), Some("general"));
    post.assert_async().await;

    // direct message from a known member: reply goes to that member
    let alice = session
        .member(&termie_client::model::MemberKey::Id(11u64.into()))
        .await
        .expect("alice");
    let incoming = termie_client::model::Message {
        content: "!ping".into(),
        author: termie_client::model::Author::Member(alice),
        channel: None,
        channel_name: None,
        id: None,
        is_server_message: false,
        session: session.key().clone(),
    };
    let reply = client.reply(&incoming, "pong").await.expect("reply");
    assert!(reply.channel_name.is_none());
    direct.assert_async().await;
}

#[tokio::test]
async fn login_events_do_not_wait_for_a_full_stream() {
    let mut http = mockito::Server::new_async().await;
    let _c = http.mock("GET", "/channels").match_query(Matcher::Any).with_status(500).create_async().await;
    let _m = http.mock("GET", "/members").match_query(Matcher::Any).with_status(500).create_async().await;

    let (connector, peers) = MemoryConnector::new();
    serve(peers);
    let mut cfg = fast_config(vec![server_config(&http, TOKEN)]);
    cfg.events.queue_capacity = 1;

    let (client, mut events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    tokio::time::timeout(Duration::from_secs(3), client.login())
        .await
        .expect("login not stuck behind the stream")
        .expect("login");
    assert_eq!(client.sessions()[0].state(), SessionState::Ready);

    let seen = drain(&mut events).await;
    let errors = seen.iter().filter(|e| matches!(e, ClientEvent::Error { .. })).count();
    let ready = seen.iter().filter(|e| matches!(e, ClientEvent::Ready)).count();
    assert_eq!(errors, 2);
    assert_eq!(ready, 1);
}

#[tokio::test]
async fn ready_waits_for_the_slowest_session() {
    let mut http = mockito::Server::new_async().await;
    let _c = mock_channels(&mut http, &["general"]).await;
    let _slow_c = http
        .mock("GET", "/channels")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bot slow")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"channels":["general"]}"#)
        .create_async()
        .await;
    let _m = mock_members(&mut http, default_members()).await;

    let (connector, peers) = MemoryConnector::new();
    let gate = Arc::new(Notify::new());
    serve_gated(peers, Arc::clone(&gate));
    let fast = server_config(&http, TOKEN);
    let mut cfg = fast_config(vec![fast.clone(), server_config(&http, "slow")]);
    cfg.login.timeout_ms = 5000;

    let (client, mut events) = Client::with_connector(&cfg, Arc::new(connector)).unwrap();
    let client = Arc::new(client);
    let login = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.login().await }
    });

    let first = client.session(&fast.base_key()).expect("session");
    tokio::time::timeout(Duration::from_secs(3), first.wait_ready())
        .await
        .expect("fast session in time")
        .expect("fast session ready");
    assert!(drain(&mut events).await.is_empty());
    assert!(!login.is_finished());

    gate.notify_one();
    login.await.unwrap().expect("login");
    let ready = drain(&mut events)
        .await
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Ready))
        .count();
    assert_eq!(ready, 1);
}
