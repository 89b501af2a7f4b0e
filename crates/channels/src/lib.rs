//! Chat transport abstraction.
//!
//! A transport (Telegram today) implements [`ChannelOutbound`] to put messages
//! in front of the user and feeds inbound updates to a [`ChannelEventSink`],
//! which the chat layer implements.

pub mod error;
pub mod keyboard;
pub mod plugin;

pub use {
    error::{Error, Result},
    keyboard::{ButtonGrid, DEFAULT_ROW_WIDTH, InlineButton},
    plugin::{ChannelEventSink, ChannelOutbound, ChannelReplyTarget, InboundEvent, InboundKind},
};
