use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::{SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{
            ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
            ParseMode,
        },
    },
    tracing::{debug, info, warn},
};

use flowrelay_channels::{ButtonGrid, ChannelOutbound};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{counter, labels, telegram as tg_metrics};

use crate::{
    Error, Result,
    markdown::{self, MarkdownChunk, TELEGRAM_MAX_MESSAGE_LEN},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends rendered units to Telegram chats.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send one chunk as HTML, then as plain text if Telegram refuses the
    /// markup.
    async fn send_chunk_with_fallback(
        &self,
        to: &str,
        chat_id: ChatId,
        chunk: &MarkdownChunk,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let html = self
            .run_with_retry(to, "send message (html)", || {
                let mut req = self
                    .bot
                    .send_message(chat_id, &chunk.html)
                    .parse_mode(ParseMode::Html);
                if let Some(keyboard) = keyboard {
                    req = req.reply_markup(keyboard.clone());
                }
                async move { req.await }
            })
            .await;

        match html {
            Ok(message) => Ok(message.id),
            Err(RequestError::Api(e)) => {
                warn!(
                    chat_id = to,
                    error = %e,
                    "telegram HTML send failed, retrying as plain text"
                );
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::PLAIN_TEXT_FALLBACKS_TOTAL).increment(1);

                let message = self
                    .run_with_retry(to, "send message (plain)", || {
                        let mut req = self.bot.send_message(chat_id, &chunk.source);
                        if let Some(keyboard) = keyboard {
                            req = req.reply_markup(keyboard.clone());
                        }
                        async move { req.await }
                    })
                    .await?;
                Ok(message.id)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn send_photo_with_fallback(
        &self,
        to: &str,
        chat_id: ChatId,
        url: &reqwest::Url,
        caption: Option<&MarkdownChunk>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let html = self
            .run_with_retry(to, "send photo (html)", || {
                let mut req = self.bot.send_photo(chat_id, InputFile::url(url.clone()));
                if let Some(caption) = caption {
                    req = req.caption(&caption.html).parse_mode(ParseMode::Html);
                }
                if let Some(keyboard) = keyboard {
                    req = req.reply_markup(keyboard.clone());
                }
                async move { req.await }
            })
            .await;

        match (html, caption) {
            (Ok(message), _) => Ok(message.id),
            // Only the caption markup can be retried; a bad URL fails either way.
            (Err(RequestError::Api(e)), Some(caption)) if is_markup_error(&e) => {
                warn!(
                    chat_id = to,
                    error = %e,
                    "telegram HTML caption refused, retrying as plain text"
                );
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::PLAIN_TEXT_FALLBACKS_TOTAL).increment(1);

                let message = self
                    .run_with_retry(to, "send photo (plain)", || {
                        let mut req = self
                            .bot
                            .send_photo(chat_id, InputFile::url(url.clone()))
                            .caption(&caption.source);
                        if let Some(keyboard) = keyboard {
                            req = req.reply_markup(keyboard.clone());
                        }
                        async move { req.await }
                    })
                    .await?;
                Ok(message.id)
            },
            (Err(e), _) => Err(e.into()),
        }
    }

    /// Run `request`, sleeping through `RetryAfter` answers a bounded number
    /// of times.
    async fn run_with_retry<T, F, Fut>(
        &self,
        to: &str,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(wait) = retry_after_duration(&err) else {
                return Err(err);
            };

            if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                warn!(
                    chat_id = to,
                    operation,
                    retries,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limit persisted after retries"
                );
                return Err(err);
            }

            retries += 1;
            warn!(
                chat_id = to,
                operation,
                retries,
                max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                retry_after_secs = wait.as_secs(),
                "telegram rate limited, waiting before retry"
            );
            #[cfg(feature = "metrics")]
            counter!(tg_metrics::RATE_LIMIT_RETRIES_TOTAL).increment(1);
            tokio::time::sleep(wait).await;
        }
    }
}

fn parse_chat_id(to: &str) -> Result<ChatId> {
    to.parse::<i64>()
        .map(ChatId)
        .map_err(|source| Error::InvalidChatId {
            chat_id: to.to_string(),
            source,
        })
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Telegram reports markup trouble as "can't parse entities".
fn is_markup_error(error: &teloxide::ApiError) -> bool {
    error.to_string().to_ascii_lowercase().contains("parse entities")
}

/// Inline keyboard with one callback button per grid cell.
#[must_use]
pub fn inline_keyboard(grid: &ButtonGrid) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(grid.rows().iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(&button.label, &button.token))
            .collect::<Vec<_>>()
    }))
}

fn record_send(kind: &'static str, ok: bool) {
    #[cfg(feature = "metrics")]
    {
        let name = if ok {
            tg_metrics::MESSAGES_SENT_TOTAL
        } else {
            tg_metrics::MESSAGE_SEND_ERRORS_TOTAL
        };
        counter!(name, labels::KIND => kind).increment(1);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (kind, ok);
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        buttons: Option<&ButtonGrid>,
    ) -> flowrelay_channels::Result<()> {
        let chat_id = parse_chat_id(to)?;
        let keyboard = buttons.filter(|g| !g.is_empty()).map(inline_keyboard);
        let chunks = markdown::chunk_markdown(text, TELEGRAM_MAX_MESSAGE_LEN);
        if chunks.is_empty() {
            return Err(flowrelay_channels::Error::invalid_input("empty message"));
        }

        let last = chunks.len() - 1;
        let mut result = Ok(());
        for (index, chunk) in chunks.iter().enumerate() {
            // Buttons ride on the final chunk so they sit under the whole text.
            let markup = keyboard.as_ref().filter(|_| index == last);
            if let Err(e) = self
                .send_chunk_with_fallback(to, chat_id, chunk, markup)
                .await
            {
                result = Err(e);
                break;
            }
        }
        record_send("text", result.is_ok());
        result?;

        info!(
            chat_id = to,
            text_len = text.len(),
            chunk_count = chunks.len(),
            buttons = buttons.map_or(0, ButtonGrid::len),
            "telegram outbound text sent"
        );
        Ok(())
    }

    async fn send_photo(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
        buttons: Option<&ButtonGrid>,
    ) -> flowrelay_channels::Result<()> {
        let chat_id = parse_chat_id(to)?;
        let url = reqwest::Url::parse(url).map_err(|e| {
            flowrelay_channels::Error::invalid_input(format!("image url {url:?}: {e}"))
        })?;
        let caption = caption.and_then(markdown::truncate_caption);
        let keyboard = buttons.filter(|g| !g.is_empty()).map(inline_keyboard);

        let result = self
            .send_photo_with_fallback(to, chat_id, &url, caption.as_ref(), keyboard.as_ref())
            .await
            .map(|_| ());
        record_send("photo", result.is_ok());
        result?;

        info!(
            chat_id = to,
            url = %url,
            caption_len = caption.as_ref().map_or(0, |c| c.source.len()),
            "telegram outbound photo sent"
        );
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> flowrelay_channels::Result<()> {
        self.bot
            .answer_callback_query(callback_id)
            .await
            .map_err(Error::from)?;
        debug!(callback_id, "telegram callback acknowledged");
        Ok(())
    }

    async fn send_typing(&self, to: &str) -> flowrelay_channels::Result<()> {
        let chat_id = parse_chat_id(to)?;
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
