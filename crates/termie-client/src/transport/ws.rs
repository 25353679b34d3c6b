//! WebSocket push channel (tokio-tungstenite).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use termie_core::error::{Result, TermieError};
use termie_core::protocol::push::PushFrame;

use super::codec::{decode, encode, Wire};
use super::{Endpoint, PushChannel, PushConnector};

#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn PushChannel>> {
        if endpoint.secure {
            // first caller wins; later installs are no-ops
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
        let url = endpoint.push_url();
        let (stream, _resp) = connect_async(url.as_str()).await.map_err(|e| TermieError::Connect {
            message: format!("websocket connect to {url} failed: {e}"),
            kind: "transport".into(),
        })?;
        tracing::debug!(%url, "push channel open");
        Ok(Box::new(WsChannel { stream }))
    }
}

struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushChannel for WsChannel {
    async fn send(&mut self, frame: PushFrame) -> Result<()> {
        let msg = encode(&frame)?;
        self.stream
            .send(msg)
            .await
            .map_err(|e| TermieError::Internal(format!("websocket send failed: {e}")))
    }

    async fn recv(&mut self) -> Option<Result<PushFrame>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => {
                    return Some(Err(TermieError::Internal(format!("websocket read failed: {e}"))))
                }
            };
            match decode(msg) {
                Ok(Wire::Frame(frame)) => return Some(Ok(frame)),
                Ok(Wire::Control) => continue,
                Ok(Wire::Close) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
