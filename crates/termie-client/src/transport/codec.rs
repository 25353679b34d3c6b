//! Decode-once codec for the WebSocket push channel.
//!
//! - Text frames => `PushFrame` envelope
//! - Binary frames => `PushFrame` if they hold UTF-8 JSON
//! - Ping/Pong are surfaced so the channel can skip them; Close ends the channel

use termie_core::{
    error::{Result, TermieError},
    protocol::push::PushFrame,
};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug)]
pub enum Wire {
    Frame(PushFrame),
    Control,
    Close,
}

pub fn decode(msg: Message) -> Result<Wire> {
    match msg {
        Message::Text(s) => Ok(Wire::Frame(PushFrame::from_json(s.as_str())?)),
        Message::Binary(b) => {
            let s = std::str::from_utf8(&b)
                .map_err(|e| TermieError::Protocol(format!("binary frame is not utf8: {e}")))?;
            Ok(Wire::Frame(PushFrame::from_json(s)?))
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Wire::Control),
        Message::Close(_) => Ok(Wire::Close),
    }
}

pub fn encode(frame: &PushFrame) -> Result<Message> {
    Ok(Message::text(frame.to_json()?))
}
