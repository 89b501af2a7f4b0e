//! Telegram transport for flowrelay.
//!
//! Long-polls the Bot API with teloxide, hands updates to a
//! [`flowrelay_channels::ChannelEventSink`], and implements
//! [`flowrelay_channels::ChannelOutbound`] for replies.

pub mod bot;
pub mod config;
mod dispatch;
pub mod error;
pub mod handlers;
pub mod markdown;
pub mod outbound;

#[cfg(test)]
mod test_api;

pub use {
    bot::{PollingHandle, start_polling},
    config::TelegramBotConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
