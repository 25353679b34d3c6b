//! Termie core: transport-agnostic wire payloads, id types, and the error surface.
//!
//! This crate defines the push-event and request/response contracts shared by the
//! client runtime and its tests. It carries no transport or runtime dependencies so
//! payloads can be decoded and asserted on without a network.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed server payloads surface as `TermieError`/`Result` instead of crashing
//! the bot process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod id;
pub mod protocol;

/// Shared result type.
pub use error::{Result, TermieError};
pub use id::Id;
