//! Turn Telegram updates into transport-neutral inbound events.
//!
//! Typed text becomes a chat turn, `/command` text goes to the command
//! handler, and inline-button presses become button turns. Everything else
//! (stickers, photos, edits) is ignored.

use {
    teloxide::types::{CallbackQuery, Message, Update, UpdateKind, User},
    tracing::{debug, warn},
};

use flowrelay_channels::{
    ChannelEventSink, ChannelOutbound, ChannelReplyTarget, Error as ChannelError, InboundEvent,
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{counter, labels, telegram as tg_metrics};

use crate::Result;

/// Route one update to its handler.
pub async fn handle_update(
    update: Update,
    outbound: &dyn ChannelOutbound,
    sink: &dyn ChannelEventSink,
) -> Result<()> {
    match update.kind {
        UpdateKind::Message(msg) => {
            record_update("message");
            handle_message(msg, outbound, sink).await
        },
        UpdateKind::CallbackQuery(query) => {
            record_update("callback_query");
            handle_callback_query(query, outbound, sink).await
        },
        other => {
            debug!("ignoring telegram update: {other:?}");
            Ok(())
        },
    }
}

pub async fn handle_message(
    msg: Message,
    outbound: &dyn ChannelOutbound,
    sink: &dyn ChannelEventSink,
) -> Result<()> {
    let chat_id = msg.chat.id.0.to_string();
    let Some(text) = msg.text() else {
        debug!(%chat_id, "ignoring non-text message");
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        debug!(%chat_id, "ignoring message without sender");
        return Ok(());
    };
    let user_id = user.id.0.to_string();

    if text.starts_with('/') {
        let reply_to = ChannelReplyTarget {
            user_id,
            chat_id: chat_id.clone(),
        };
        match sink.dispatch_command(text, reply_to).await {
            Ok(reply) => outbound.send_text(&chat_id, &reply, None).await?,
            Err(ChannelError::InvalidInput { message }) => {
                debug!(%chat_id, %message, "ignoring unknown command");
            },
            Err(e) => return Err(e.into()),
        }
        return Ok(());
    }

    let mut event = InboundEvent::text(user_id, chat_id, text);
    event.sender_name = sender_name(user);
    sink.dispatch_to_chat(event).await;
    Ok(())
}

pub async fn handle_callback_query(
    query: CallbackQuery,
    outbound: &dyn ChannelOutbound,
    sink: &dyn ChannelEventSink,
) -> Result<()> {
    let Some(token) = query.data else {
        // Game buttons and the like carry no data; just clear the spinner.
        outbound.acknowledge(&query.id).await?;
        return Ok(());
    };

    let user_id = query.from.id.0.to_string();
    // A button under an inaccessible message still answers in the private chat.
    let chat_id = query
        .message
        .as_ref()
        .map_or_else(|| user_id.clone(), |m| m.chat().id.0.to_string());
    if query.message.is_none() {
        warn!(%user_id, "callback without message, replying in private chat");
    }

    let mut event = InboundEvent::button(user_id, chat_id, token, query.id);
    event.sender_name = sender_name(&query.from);
    sink.dispatch_to_chat(event).await;
    Ok(())
}

fn sender_name(user: &User) -> Option<String> {
    let last = user.last_name.as_deref().unwrap_or("");
    let name = format!("{} {last}", user.first_name).trim().to_string();
    if name.is_empty() {
        user.username.clone()
    } else {
        Some(name)
    }
}

fn record_update(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(tg_metrics::UPDATES_RECEIVED_TOTAL, labels::KIND => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
