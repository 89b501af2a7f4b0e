use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

use crate::{Error, Result};

pub const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;

/// Headroom between the long-poll timeout and the HTTP client timeout, so
/// the client never gives up before Telegram answers.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

/// Bot connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramBotConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Bot API root. Defaults to `https://api.telegram.org`.
    pub api_url: Option<String>,

    /// Long-polling timeout for `getUpdates`.
    pub poll_timeout_secs: u32,
}

impl Default for TelegramBotConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_url: None,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for TelegramBotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBotConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramBotConfig {
    pub fn new(token: Secret<String>) -> Self {
        Self {
            token,
            ..Default::default()
        }
    }

    /// Build a bot whose HTTP client outlives a long poll.
    pub fn build_bot(&self) -> Result<teloxide::Bot> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(Error::message("telegram bot token is empty"));
        }
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(self.poll_timeout_secs.into()) + CLIENT_TIMEOUT_MARGIN)
            .build()?;
        let bot = teloxide::Bot::with_client(self.token.expose_secret(), client);
        match self.api_url.as_deref() {
            Some(url) => {
                let url = reqwest::Url::parse(url)
                    .map_err(|e| Error::message(format!("invalid telegram api url {url:?}: {e}")))?;
                Ok(bot.set_api_url(url))
            },
            None => Ok(bot),
        }
    }
}
