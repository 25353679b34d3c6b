//! In-memory push channel.
//!
//! `MemoryConnector` hands the server side of every accepted connection to a
//! `MemoryPeer` receiver, so a test (or an embedding host) can script the server.
//! Attempts can be made to fail with `fail_next`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use termie_core::error::{Result, TermieError};
use termie_core::protocol::push::PushFrame;

use super::{Endpoint, PushChannel, PushConnector};

pub struct MemoryConnector {
    attempts: AtomicUsize,
    failures: AtomicUsize,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Connector plus the stream of accepted server-side peers.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self {
            attempts: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            accepted,
        };
        (connector, rx)
    }

    /// Fail the next `n` attempts. `usize::MAX` fails every attempt.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Total attempts seen, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushConnector for MemoryConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(TermieError::Connect {
                message: format!("simulated connect failure ({endpoint})"),
                kind: "transport".into(),
            });
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            endpoint: endpoint.clone(),
            tx: server_tx,
            rx: server_rx,
        };
        self.accepted.send(peer).map_err(|_| TermieError::Connect {
            message: format!("no listener for {endpoint}"),
            kind: "transport".into(),
        })?;

        Ok(Box::new(MemoryChannel {
            tx: client_tx,
            rx: client_rx,
        }))
    }
}

/// Server side of one in-memory connection.
pub struct MemoryPeer {
    pub endpoint: Endpoint,
    tx: mpsc::UnboundedSender<PushFrame>,
    rx: mpsc::UnboundedReceiver<PushFrame>,
}

impl MemoryPeer {
    /// Push an event to the client. False once the client side is gone.
    pub fn emit(&self, event: &str, data: impl Serialize) -> bool {
        match PushFrame::new(event, data) {
            Ok(frame) => self.tx.send(frame).is_ok(),
            Err(_) => false,
        }
    }

    /// Next frame sent by the client.
    pub async fn recv(&mut self) -> Option<PushFrame> {
        self.rx.recv().await
    }

    /// True once the client closed or dropped its side.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct MemoryChannel {
    tx: mpsc::UnboundedSender<PushFrame>,
    rx: mpsc::UnboundedReceiver<PushFrame>,
}

#[async_trait]
impl PushChannel for MemoryChannel {
    async fn send(&mut self, frame: PushFrame) -> Result<()> {
        self.tx.send(frame).map_err(|_| TermieError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<Result<PushFrame>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
