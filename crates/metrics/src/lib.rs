//! Metrics for flowrelay.
//!
//! Crates record through the `metrics` crate facade, re-exported here, using
//! the names in this crate so every exported series is listed in one place.
//! Nothing is exported until [`init_metrics`] installs a recorder; with the
//! `prometheus` feature that recorder also serves a scrape endpoint.
//!
//! ```rust,ignore
//! use flowrelay_metrics::{counter, chat, labels};
//!
//! counter!(chat::TURNS_TOTAL, labels::OUTCOME => "ok").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
