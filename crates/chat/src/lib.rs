//! The chat layer: one inbound event in, rendered messages out.
//!
//! [`ChatOrchestrator`] runs a turn end to end and is the transport's
//! [`ChannelEventSink`](flowrelay_channels::ChannelEventSink). [`render`] maps
//! a normalized response onto a [`ChannelOutbound`](flowrelay_channels::ChannelOutbound).

pub mod buttons;
pub mod commands;
pub mod orchestrator;
pub mod render;

#[cfg(test)]
mod test_support;

pub use {
    buttons::ButtonRegistry,
    commands::Command,
    orchestrator::ChatOrchestrator,
    render::{IssueToken, RenderOutcome, RenderPlan, RenderUnit, plan, render},
};
