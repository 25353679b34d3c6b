//! Single-shot request gateway.
//!
//! One call performs exactly one HTTP request and buffers the whole response:
//! - JSON content type => `Reply::Json`, anything else => `Reply::Text`
//! - non-2xx => `RequestError::Status` carrying that parsed/raw body
//! - `GET` sends the body object as query parameters; other methods send it as a
//!   JSON body when the declared content type is JSON
//!
//! The transport capability (`Scheme`) is fixed at construction.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde_json::Value;

use termie_core::error::{RequestError, Result, TermieError};
use termie_core::protocol::rest::Reply;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Transport capability of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub body: Option<Value>,
}

impl GatewayRequest {
    pub fn new(method: Method, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            method,
            headers: Vec::new(),
            host: host.into(),
            port,
            path: path.into(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `Authorization: Bot {token}`.
    pub fn bot_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bot {token}"))
    }

    fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RequestGateway {
    http: reqwest::Client,
    scheme: Scheme,
}

impl RequestGateway {
    pub fn new(scheme: Scheme) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("termie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TermieError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self { http, scheme })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub async fn send(&self, req: GatewayRequest) -> std::result::Result<Reply, RequestError> {
        let base = format!("{}://{}:{}", self.scheme.as_str(), req.host, req.port);
        let mut url = Url::parse(&base)
            .map_err(|e| RequestError::Invalid(format!("bad address {base}: {e}")))?;
        url.set_path(&req.path);

        let mut builder = self.http.request(req.method.clone(), url);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &req.body {
            if req.method == Method::GET {
                builder = builder.query(&query_pairs(body)?);
            } else if req.content_type().is_some_and(is_json_type) {
                let raw = serde_json::to_vec(body)
                    .map_err(|e| RequestError::Invalid(format!("body encode failed: {e}")))?;
                builder = builder.body(raw);
            }
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        let status = resp.status();
        let json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json_type);
        let raw: Bytes = resp
            .bytes()
            .await
            .map_err(|e| RequestError::Transport(format!("read body failed: {e}")))?;

        tracing::debug!(method = %req.method, path = %req.path, status = status.as_u16(), "request complete");

        let body = if json {
            match serde_json::from_slice::<Value>(&raw) {
                Ok(v) => Reply::Json(v),
                Err(e) if status.is_success() => {
                    return Err(RequestError::Decode(format!("invalid json body: {e}")))
                }
                Err(_) => Reply::Text(String::from_utf8_lossy(&raw).into_owned()),
            }
        } else {
            Reply::Text(String::from_utf8_lossy(&raw).into_owned())
        };

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn is_json_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|t| t.eq_ignore_ascii_case(CONTENT_TYPE_JSON))
}

// null values are left out of the query string.
fn query_pairs(body: &Value) -> std::result::Result<Vec<(String, String)>, RequestError> {
    let Value::Object(map) = body else {
        return Err(RequestError::Invalid("GET body must be an object".into()));
    };
    Ok(map
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect())
}
