//! Inbound event routing.
//!
//! Re-exports the per-session router so downstream consumers can depend on this
//! module directly.

pub mod router;

pub use router::EventRouter;
