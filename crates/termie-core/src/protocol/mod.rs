//! Protocol modules (push events + request surface).
//!
//! - Push lane: named JSON events exchanged over the persistent channel.
//! - Request lane: JSON bodies of the one-shot bulk fetch / send requests.
//!
//! Decoders are panic-free: malformed input is reported as `TermieError::Protocol`.

pub mod push;
pub mod rest;
