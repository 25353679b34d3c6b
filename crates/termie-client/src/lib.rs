//! Termie client library entry.
//!
//! Wires the push transport, request gateway, per-server sessions, and event routing
//! into one client that presents a single event stream over any number of servers.
//! Consumed by the demo binary (`main.rs`) and by integration tests.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod gateway;
pub mod model;
pub mod provision;
pub mod registry;
pub mod session;
pub mod transport;

pub use client::Client;
pub use events::{ClientEvent, EventStream};
