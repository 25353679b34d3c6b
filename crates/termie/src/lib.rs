//! Top-level facade crate for Termie.
//!
//! Re-exports core types and the client library so users can depend on a single crate.

pub mod core {
    pub use termie_core::*;
}

pub mod client {
    pub use termie_client::*;
}
