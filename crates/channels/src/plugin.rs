use {async_trait::async_trait, serde::Serialize};

use crate::{Result, keyboard::ButtonGrid};

// ── Inbound ─────────────────────────────────────────────────────────────────

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundKind {
    /// Typed a message.
    Text { text: String },
    /// Pressed an inline button. `callback_id` identifies the press for
    /// acknowledgement; `token` is the data the button was created with.
    Button { token: String, callback_id: String },
}

/// One inbound update, already stripped of platform detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundEvent {
    pub user_id: String,
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(flatten)]
    pub kind: InboundKind,
}

impl InboundEvent {
    pub fn text(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            sender_name: None,
            kind: InboundKind::Text { text: text.into() },
        }
    }

    pub fn button(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        token: impl Into<String>,
        callback_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            sender_name: None,
            kind: InboundKind::Button {
                token: token.into(),
                callback_id: callback_id.into(),
            },
        }
    }

    #[must_use]
    pub fn reply_target(&self) -> ChannelReplyTarget {
        ChannelReplyTarget {
            user_id: self.user_id.clone(),
            chat_id: self.chat_id.clone(),
        }
    }
}

/// Who asked, and where the answer goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReplyTarget {
    pub user_id: String,
    pub chat_id: String,
}

/// Receives inbound updates from a transport. The chat layer provides the
/// concrete implementation.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Run one conversational turn for a message or button press.
    async fn dispatch_to_chat(&self, event: InboundEvent);

    /// Handle a slash command (`start`, `clear`, `stats`) and return the reply
    /// text.
    async fn dispatch_command(&self, command: &str, reply_to: ChannelReplyTarget)
    -> Result<String>;
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// Send messages to a chat.
///
/// Each call is one renderable unit. A `Rejected` error means the platform
/// refused that unit only.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str, buttons: Option<&ButtonGrid>) -> Result<()>;

    async fn send_photo(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
        buttons: Option<&ButtonGrid>,
    ) -> Result<()>;

    /// Dismiss the client-side spinner on a pressed button.
    async fn acknowledge(&self, callback_id: &str) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _to: &str) -> Result<()> {
        Ok(())
    }
}
