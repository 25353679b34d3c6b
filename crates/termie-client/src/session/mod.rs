//! Per-server sessions and the state each one owns.

pub mod lifecycle;
pub mod state;

pub use lifecycle::{Session, SessionState};
pub use state::StateStore;
