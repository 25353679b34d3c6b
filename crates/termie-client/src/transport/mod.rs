//! Transport layer (push channel).
//!
//! The persistent push channel is an external collaborator: this module defines the
//! seam (`PushConnector` / `PushChannel`) plus two implementations, a WebSocket one for
//! production and an in-memory one for tests and embedding. Frames are decoded once
//! by the codec before they reach the session.

pub mod codec;
pub mod memory;
pub mod ws;

use std::fmt;

use async_trait::async_trait;

use termie_core::error::Result;
use termie_core::protocol::push::PushFrame;

use crate::config::ServerConfig;
use crate::gateway::Scheme;

pub use memory::{MemoryConnector, MemoryPeer};
pub use ws::WsConnector;

/// Where one session connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub hostname: String,
    pub port: u16,
    pub secure: bool,
}

impl Endpoint {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            hostname: cfg.hostname().to_owned(),
            port: cfg.port,
            secure: cfg.secure(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        if self.secure {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    /// URL of the push channel.
    pub fn push_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/", self.hostname, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// Opens push channels. One call is one low-level connection attempt.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>>;
}

/// An open, ordered, reliable channel of named events.
#[async_trait]
pub trait PushChannel: Send {
    async fn send(&mut self, frame: PushFrame) -> Result<()>;

    /// Next inbound frame; `None` once the channel has ended.
    /// Must be cancel-safe: it is polled inside `select!`.
    async fn recv(&mut self) -> Option<Result<PushFrame>>;

    async fn close(&mut self);
}
