//! Push lane envelope and event payloads.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. `data` is kept as a raw
//! `Value` in the envelope and decoded once by [`Inbound::decode`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TermieError};
use crate::id::Id;

/// Event names used on the push channel.
pub mod events {
    pub const LOGIN: &str = "login";
    pub const METHOD_RESULT: &str = "methodResult";
    pub const AUTH_RESULT: &str = "authResult";
    pub const MEMBER_CONNECT: &str = "memberConnect";
    pub const MEMBER_DISCONNECT: &str = "memberDisconnect";
    pub const MESSAGE: &str = "msg";
}

/// One named event on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Result<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| TermieError::Protocol(format!("encode failed: {e}")))?;
        Ok(Self { event: event.into(), data })
    }

    /// Outbound auth announcement.
    pub fn login(token: &str) -> Result<Self> {
        Self::new(events::LOGIN, LoginRequest { bot: true, token: token.to_owned() })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TermieError::Protocol(format!("encode failed: {e}")))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| TermieError::Protocol(format!("invalid frame json: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub bot: bool,
    pub token: String,
}

/// Handshake result sent once after the channel opens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Reply to `login`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub bot: Option<BotIdentity>,
}

/// The bot's own identity, issued on successful auth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub uid: String,
    pub id: Id,
    pub username: String,
    pub tag: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Member as described by the server (push events and bulk fetch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub uid: String,
    pub id: Id,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tag: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub bot: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberEvent {
    pub member: MemberRecord,
}

/// Incoming chat message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "msg", alias = "content", default)]
    pub content: String,
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(rename = "userID", alias = "userId", default)]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(rename = "server", alias = "isServer", default, deserialize_with = "lenient_bool")]
    pub is_server: bool,
}

/// Decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    MethodResult(MethodResult),
    AuthResult(AuthResult),
    MemberConnect(MemberRecord),
    MemberDisconnect(MemberRecord),
    Message(MessageEvent),
    /// Event name this runtime does not handle.
    Other(String),
}

impl Inbound {
    pub fn decode(frame: PushFrame) -> Result<Self> {
        let PushFrame { event, data } = frame;
        Ok(match event.as_str() {
            events::METHOD_RESULT => Inbound::MethodResult(payload(&event, data)?),
            events::AUTH_RESULT => Inbound::AuthResult(payload(&event, data)?),
            events::MEMBER_CONNECT => {
                Inbound::MemberConnect(payload::<MemberEvent>(&event, data)?.member)
            }
            events::MEMBER_DISCONNECT => {
                Inbound::MemberDisconnect(payload::<MemberEvent>(&event, data)?.member)
            }
            events::MESSAGE => Inbound::Message(payload(&event, data)?),
            _ => Inbound::Other(event),
        })
    }

    /// Event name, for logging.
    pub fn name(&self) -> &str {
        match self {
            Inbound::MethodResult(_) => events::METHOD_RESULT,
            Inbound::AuthResult(_) => events::AUTH_RESULT,
            Inbound::MemberConnect(_) => events::MEMBER_CONNECT,
            Inbound::MemberDisconnect(_) => events::MEMBER_DISCONNECT,
            Inbound::Message(_) => events::MESSAGE,
            Inbound::Other(name) => name,
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| TermieError::Protocol(format!("invalid {event} payload: {e}")))
}

// Profile fields may be null or numeric; null reads as empty.
fn lenient_string<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!("expected a string, got {other}"))),
    }
}

// The server is loose with flags: accepts true/false, 0/1, and null.
fn lenient_bool<'de, D>(d: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    })
}
