#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use mockito::Matcher;
use reqwest::Method;
use serde_json::json;

use termie_client::gateway::{GatewayRequest, RequestGateway, Scheme, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
use termie_client::provision::{self, BotProfile, Owner};
use termie_core::error::RequestError;
use termie_core::protocol::rest::Reply;

fn target(http: &mockito::ServerGuard) -> (String, u16) {
    let hp = http.host_with_port();
    let (host, port) = hp.rsplit_once(':').unwrap();
    (host.to_owned(), port.parse().unwrap())
}

#[tokio::test]
async fn get_sends_body_as_query_and_parses_json() {
    let mut http = mockito::Server::new_async().await;
    let mock = http
        .mock("GET", "/members")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sessionID".into(), "abc".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(r#"{"members":[]}"#)
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let req = GatewayRequest::new(Method::GET, host, port, "/members")
        .header("Content-Type", CONTENT_TYPE_FORM)
        .body(json!({ "sessionID": "abc", "limit": 5, "channel": null }));

    let reply = gw.send(req).await.unwrap();
    mock.assert_async().await;
    assert_eq!(reply, Reply::Json(json!({ "members": [] })));
}

#[tokio::test]
async fn non_json_reply_is_text() {
    let mut http = mockito::Server::new_async().await;
    let _m = http
        .mock("GET", "/ping")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("pong")
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let reply = gw.send(GatewayRequest::new(Method::GET, host, port, "/ping")).await.unwrap();
    assert_eq!(reply, Reply::Text("pong".into()));
}

#[tokio::test]
async fn error_status_rejects_with_parsed_or_raw_body() {
    let mut http = mockito::Server::new_async().await;
    let _json = http
        .mock("GET", "/json")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"gone"}"#)
        .create_async()
        .await;
    let _broken = http
        .mock("GET", "/broken")
        .with_status(502)
        .with_header("content-type", "application/json")
        .with_body("<html>bad gateway</html>")
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();

    match gw.send(GatewayRequest::new(Method::GET, host.clone(), port, "/json")).await {
        Err(RequestError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, Reply::Json(json!({ "message": "gone" })));
        }
        other => panic!("unexpected: {other:?}"),
    }
    match gw.send(GatewayRequest::new(Method::GET, host, port, "/broken")).await {
        Err(RequestError::Status { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, Reply::Text("<html>bad gateway</html>".into()));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_json_on_success_is_a_decode_error() {
    let mut http = mockito::Server::new_async().await;
    let _m = http
        .mock("GET", "/channels")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{not json")
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let err = gw
        .send(GatewayRequest::new(Method::GET, host, port, "/channels"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, RequestError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let err = gw
        .send(GatewayRequest::new(Method::GET, "127.0.0.1", 1, "/channels"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, RequestError::Transport(_)));
}

#[tokio::test]
async fn create_bot_posts_camel_case_body() {
    let mut http = mockito::Server::new_async().await;
    let mock = http
        .mock("POST", "/bots/create")
        .match_header("content-type", CONTENT_TYPE_JSON)
        .match_body(Matcher::Json(json!({
            "ownerUid": "owner",
            "ownerPassword": "pw",
            "uid": "bottybot",
            "username": "Botty",
            "tag": "0001"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token":"t0k3n","uid":"bottybot"}"#)
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let profile = BotProfile {
        uid: "bottybot".into(),
        username: "Botty".into(),
        tag: "0001".into(),
    };
    let owner = Owner {
        uid: "owner".into(),
        password: "pw".into(),
    };

    let created = provision::create_bot(&gw, &host, port, &profile, &owner).await.unwrap();
    mock.assert_async().await;
    assert_eq!(created.token, "t0k3n");
    assert_eq!(created.extra["uid"], "bottybot");
}

#[tokio::test]
async fn create_bot_validates_before_sending() {
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let profile = BotProfile {
        uid: "bottybot".into(),
        username: String::new(),
        tag: "0001".into(),
    };
    let owner = Owner {
        uid: "owner".into(),
        password: "pw".into(),
    };

    let err = provision::create_bot(&gw, "127.0.0.1", 1, &profile, &owner)
        .await
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "ConfigError");
}

#[tokio::test]
async fn create_bot_rejection_keeps_server_message() {
    let mut http = mockito::Server::new_async().await;
    let _m = http
        .mock("POST", "/bots/create")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Wrong password","type":"unauthorized"}"#)
        .create_async()
        .await;

    let (host, port) = target(&http);
    let gw = RequestGateway::new(Scheme::Http).unwrap();
    let profile = BotProfile {
        uid: "b".into(),
        username: "B".into(),
        tag: "0001".into(),
    };
    let owner = Owner {
        uid: "o".into(),
        password: "nope".into(),
    };

    let err = provision::create_bot(&gw, &host, port, &profile, &owner)
        .await
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "CreateBotError");
    let remote = err.remote().unwrap();
    assert_eq!(remote.message, "Wrong password");
    assert_eq!(remote.kind.as_deref(), Some("unauthorized"));
    assert_eq!(remote.status, Some(401));
}
