use std::{sync::Arc, time::Duration};

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use flowrelay_channels::ChannelEventSink;

#[cfg(feature = "metrics")]
use flowrelay_metrics::{histogram, telegram as tg_metrics};

use crate::{Result, dispatch::UserQueues, outbound::TelegramOutbound};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A running polling loop.
pub struct PollingHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Token that stops the loop when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to end.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "telegram polling task failed");
        }
    }

    /// Stop polling and wait for the loop to end. Turns already dispatched
    /// keep running.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }
}

/// Connect the bot and start long polling.
///
/// `commands` are `(name, description)` pairs registered for client-side
/// autocomplete. One user's updates are handled in arrival order; different
/// users run concurrently.
pub async fn start_polling(
    bot: Bot,
    poll_timeout_secs: u32,
    commands: &[(&str, &str)],
    outbound: Arc<TelegramOutbound>,
    sink: Arc<dyn ChannelEventSink>,
) -> Result<PollingHandle> {
    let me = bot.get_me().await?;
    let username = me.username.clone();

    // Long polling and a webhook cannot coexist.
    bot.delete_webhook().await?;

    let commands: Vec<BotCommand> = commands
        .iter()
        .map(|(name, description)| BotCommand::new(*name, *description))
        .collect();
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(username = ?username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_loop(
        bot,
        poll_timeout_secs,
        outbound,
        sink,
        cancel.clone(),
    ));
    Ok(PollingHandle { cancel, task })
}

async fn poll_loop(
    bot: Bot,
    poll_timeout_secs: u32,
    outbound: Arc<TelegramOutbound>,
    sink: Arc<dyn ChannelEventSink>,
    cancel: CancellationToken,
) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;
    let mut queues = UserQueues::new(outbound, sink);

    loop {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request.send() => result,
        };

        #[cfg(feature = "metrics")]
        histogram!(tg_metrics::POLLING_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(updates) => {
                if !updates.is_empty() {
                    debug!(count = updates.len(), "got telegram updates");
                }
                for update in updates {
                    offset = update.id.as_offset();
                    queues.dispatch(update);
                }
                queues.prune();
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is running with this token");
                cancel.cancel();
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}
