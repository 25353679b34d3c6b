//! Shared error type across Termie crates.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::rest::Reply;

/// `type` reported when the connect retry budget is exhausted.
pub const NO_CONNECTION: &str = "noConnection";

/// Stable error codes (safe to match on or log).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Could not open the push channel, or the server rejected it.
    Connect,
    /// Credentials rejected.
    Auth,
    /// Channel bulk fetch failed.
    GetChannels,
    /// Member bulk fetch failed.
    GetMembers,
    /// Outbound message failed.
    SendMessage,
    /// Bot provisioning failed.
    CreateBot,
    /// Push channel ended unexpectedly.
    ChannelClosed,
    /// Malformed payload from the server.
    Protocol,
    /// Invalid configuration or arguments.
    Config,
    /// Operation not valid in the current lifecycle state.
    InvalidState,
    /// Unknown session/channel/member.
    NotFound,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and error events.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Connect => "ConnectError",
            ErrorCode::Auth => "AuthError",
            ErrorCode::GetChannels => "GetChannelsError",
            ErrorCode::GetMembers => "GetMembersError",
            ErrorCode::SendMessage => "SendMessageError",
            ErrorCode::CreateBot => "CreateBotError",
            ErrorCode::ChannelClosed => "ChannelClosed",
            ErrorCode::Protocol => "ProtocolError",
            ErrorCode::Config => "ConfigError",
            ErrorCode::InvalidState => "InvalidState",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::Internal => "Internal",
        }
    }
}

/// Failure reported by the remote request surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// Human readable message (`message` field of the error body, or the raw body).
    pub message: String,
    /// Server error type (`type` field), if any.
    pub kind: Option<String>,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, self.status) {
            (Some(kind), Some(status)) => write!(f, "{} ({kind}, status {status})", self.message),
            (Some(kind), None) => write!(f, "{} ({kind})", self.message),
            (None, Some(status)) => write!(f, "{} (status {status})", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl From<RequestError> for RemoteError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Status { status, body } => {
                let (message, kind) = match &body {
                    Reply::Json(v) => (
                        v.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_owned)
                            .unwrap_or_else(|| v.to_string()),
                        v.get("type").and_then(Value::as_str).map(str::to_owned),
                    ),
                    Reply::Text(s) => (s.clone(), None),
                };
                RemoteError { message, kind, status: Some(status) }
            }
            other => RemoteError {
                message: other.to_string(),
                kind: None,
                status: None,
            },
        }
    }
}

/// Single-shot request failure.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Non-2xx status; `body` is the parsed JSON or raw text.
    #[error("request rejected with status {status}")]
    Status { status: u16, body: Reply },
    #[error("transport: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TermieError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum TermieError {
    #[error("connect failed ({kind}): {message}")]
    Connect { message: String, kind: String },
    #[error("auth failed ({kind}): {message}")]
    Auth { message: String, kind: String },
    #[error("channel fetch failed: {0}")]
    GetChannels(RemoteError),
    #[error("member fetch failed: {0}")]
    GetMembers(RemoteError),
    #[error("send failed: {0}")]
    SendMessage(RemoteError),
    #[error("bot creation failed: {0}")]
    CreateBot(RemoteError),
    #[error("push channel closed")]
    ChannelClosed,
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("config: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl TermieError {
    /// Connect retry budget exhausted.
    pub fn no_connection(endpoint: &str, attempts: u32) -> Self {
        TermieError::Connect {
            message: format!(
                "Unable to establish connection to the server ({endpoint}) after {attempts} attempts"
            ),
            kind: NO_CONNECTION.into(),
        }
    }

    /// True for the exhausted-retries connect failure.
    pub fn is_no_connection(&self) -> bool {
        matches!(self, TermieError::Connect { kind, .. } if kind == NO_CONNECTION)
    }

    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TermieError::Connect { .. } => ErrorCode::Connect,
            TermieError::Auth { .. } => ErrorCode::Auth,
            TermieError::GetChannels(_) => ErrorCode::GetChannels,
            TermieError::GetMembers(_) => ErrorCode::GetMembers,
            TermieError::SendMessage(_) => ErrorCode::SendMessage,
            TermieError::CreateBot(_) => ErrorCode::CreateBot,
            TermieError::ChannelClosed => ErrorCode::ChannelClosed,
            TermieError::Protocol(_) => ErrorCode::Protocol,
            TermieError::Config(_) => ErrorCode::Config,
            TermieError::InvalidState(_) => ErrorCode::InvalidState,
            TermieError::NotFound(_) => ErrorCode::NotFound,
            TermieError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// The remote failure behind a request-surface error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            TermieError::GetChannels(r)
            | TermieError::GetMembers(r)
            | TermieError::SendMessage(r)
            | TermieError::CreateBot(r) => Some(r),
            _ => None,
        }
    }
}
