//! Per-user conversation state.
//!
//! Sessions live in memory only and vanish on restart. Each one holds the
//! runtime context that is round-tripped on every turn and a plain history of
//! what was said.

pub mod session;
pub mod store;

pub use {
    session::{HistoryEntry, Session},
    store::SessionStore,
};
