//! Interaction log and usage counters.
//!
//! One [`AnalyticsRecord`] is appended per completed turn and the user's
//! [`UserMetrics`] are bumped in the same critical section. Counters only grow.

pub mod recorder;
pub mod types;

pub use {
    recorder::AnalyticsRecorder,
    types::{
        AnalyticsRecord, GlobalMetrics, InboundMessage, MessageOrigin, ResponseSummary,
        UserMetrics,
    },
};
