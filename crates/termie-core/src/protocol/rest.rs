//! Request lane bodies (bulk fetch, send, provisioning).

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;
use crate::id::Id;
use crate::protocol::push::MemberRecord;

/// Buffered response body: JSON when the response declared a JSON content type,
/// raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Text(String),
}

impl Reply {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Reply::Json(v) => Some(v),
            Reply::Text(_) => None,
        }
    }

    /// Decode a JSON reply into a typed body.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, RequestError> {
        match self {
            Reply::Json(v) => serde_json::from_value(v)
                .map_err(|e| RequestError::Decode(format!("unexpected body shape: {e}"))),
            Reply::Text(s) => Err(RequestError::Decode(format!("expected json, got text: {s}"))),
        }
    }
}

/// `GET /channels`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelList {
    pub channels: Vec<String>,
}

/// `GET /members`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberList {
    pub members: Vec<MemberEntry>,
}

/// A member list entry: a real member, or the anonymous-observer aggregate (no id).
///
/// The aggregate must carry its `lurkers` count; an object that is neither a member nor
/// a lurker marker fails the whole list instead of turning into a bogus aggregate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MemberEntry {
    Member(MemberRecord),
    Lurkers { lurkers: u64 },
}

/// Query for `GET /channels` and `GET /members`.
#[derive(Debug, Clone, Serialize)]
pub struct FetchQuery<'a> {
    #[serde(rename = "sessionID")]
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<&'a str>,
}

/// Body of `POST /channels/{name}` and `POST /members/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageBody {
    #[serde(rename = "userID")]
    pub user_id: Id,
    pub uid: String,
    pub username: String,
    pub tag: String,
    pub msg: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Reply of a successful send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SentMessage {
    pub message: SentMessageBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SentMessageBody {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub id: Option<Id>,
}

/// Body of `POST /bots/create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBotBody {
    pub owner_uid: String,
    pub owner_password: String,
    pub uid: String,
    pub username: String,
    pub tag: String,
}

/// Reply of `POST /bots/create`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedBot {
    pub token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
