//! Per-user update ordering.
//!
//! Each user with pending updates gets a worker task that handles them one at
//! a time in arrival order. Different users run concurrently. A worker exits
//! after [`QUEUE_IDLE`] without updates; the next update starts a new one.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    teloxide::types::{Update, UserId},
    tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::SendError},
    tracing::{debug, error},
};

use flowrelay_channels::{ChannelEventSink, ChannelOutbound};

use crate::handlers;

pub(crate) const QUEUE_IDLE: Duration = Duration::from_secs(30);

pub(crate) struct UserQueues {
    outbound: Arc<dyn ChannelOutbound>,
    sink: Arc<dyn ChannelEventSink>,
    queues: HashMap<UserId, UnboundedSender<Update>>,
}

impl UserQueues {
    pub(crate) fn new(outbound: Arc<dyn ChannelOutbound>, sink: Arc<dyn ChannelEventSink>) -> Self {
        Self {
            outbound,
            sink,
            queues: HashMap::new(),
        }
    }

    /// Queue `update` behind the sender's earlier updates.
    pub(crate) fn dispatch(&mut self, update: Update) {
        let Some(user) = update.from().map(|user| user.id) else {
            let (outbound, sink) = (Arc::clone(&self.outbound), Arc::clone(&self.sink));
            tokio::spawn(async move { handle(update, outbound.as_ref(), sink.as_ref()).await });
            return;
        };

        let update = match self.queues.get(&user) {
            Some(queue) => match queue.send(update) {
                Ok(()) => return,
                // Worker went idle and closed its queue.
                Err(SendError(update)) => update,
            },
            None => update,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.insert(user, tx);
        debug!(user_id = user.0, "starting update worker");
        tokio::spawn(drain_queue(
            update,
            rx,
            Arc::clone(&self.outbound),
            Arc::clone(&self.sink),
        ));
    }

    /// Drop queues whose worker has exited.
    pub(crate) fn prune(&mut self) {
        self.queues.retain(|_, queue| !queue.is_closed());
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.queues.values().filter(|q| !q.is_closed()).count()
    }
}

async fn drain_queue(
    first: Update,
    mut rx: UnboundedReceiver<Update>,
    outbound: Arc<dyn ChannelOutbound>,
    sink: Arc<dyn ChannelEventSink>,
) {
    handle(first, outbound.as_ref(), sink.as_ref()).await;
    loop {
        match tokio::time::timeout(QUEUE_IDLE, rx.recv()).await {
            Ok(Some(update)) => handle(update, outbound.as_ref(), sink.as_ref()).await,
            Ok(None) => return,
            Err(_) => {
                // Refuse new updates, then finish the ones already queued.
                rx.close();
                while let Some(update) = rx.recv().await {
                    handle(update, outbound.as_ref(), sink.as_ref()).await;
                }
                return;
            },
        }
    }
}

async fn handle(update: Update, outbound: &dyn ChannelOutbound, sink: &dyn ChannelEventSink) {
    if let Err(e) = handlers::handle_update(update, outbound, sink).await {
        error!(error = %e, "error handling telegram update");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        async_trait::async_trait,
        flowrelay_channels::{ChannelReplyTarget, InboundEvent, InboundKind},
        serde_json::json,
    };

    use {super::*, crate::TelegramOutbound, teloxide::Bot};

    /// Forwards `(user, text)`; the text "slow" takes a while.
    struct SlowSink(UnboundedSender<(String, String)>);

    #[async_trait]
    impl ChannelEventSink for SlowSink {
        async fn dispatch_to_chat(&self, event: InboundEvent) {
            let InboundKind::Text { text } = event.kind else {
                return;
            };
            if text == "slow" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            let _ = self.0.send((event.user_id, text));
        }

        async fn dispatch_command(
            &self,
            _command: &str,
            _reply_to: ChannelReplyTarget,
        ) -> flowrelay_channels::Result<String> {
            Ok("ok".into())
        }
    }

    fn text_update(update_id: i32, user_id: u64, text: &str) -> Update {
        // teloxide's `Update` deserializer misreads `serde_json::Value`; go through a string.
        serde_json::from_str(&json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "date": 1,
                "chat": { "id": user_id, "type": "private", "first_name": "U" },
                "from": { "id": user_id, "is_bot": false, "first_name": "U" },
                "text": text,
            },
        })
        .to_string())
        .unwrap()
    }

    fn queues(tx: UnboundedSender<(String, String)>) -> UserQueues {
        // Text turns never call the Bot API.
        let bot = Bot::new("123456:offline");
        UserQueues::new(
            Arc::new(TelegramOutbound::new(bot)),
            Arc::new(SlowSink(tx)),
        )
    }

    #[tokio::test]
    async fn one_user_in_order_others_in_parallel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queues = queues(tx);

        queues.dispatch(text_update(1, 7, "slow"));
        queues.dispatch(text_update(2, 7, "second"));
        queues.dispatch(text_update(3, 8, "other"));

        let mut received = Vec::new();
        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(event);
        }
        let received: Vec<(&str, &str)> = received
            .iter()
            .map(|(user, text)| (user.as_str(), text.as_str()))
            .collect();
        assert_eq!(received, vec![
            ("8", "other"),
            ("7", "slow"),
            ("7", "second")
        ]);
        assert_eq!(queues.active(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_exits_and_is_replaced() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut queues = queues(tx);

        queues.dispatch(text_update(1, 7, "hi"));
        assert_eq!(rx.recv().await.unwrap().1, "hi");

        tokio::time::sleep(QUEUE_IDLE + Duration::from_secs(1)).await;
        queues.prune();
        assert_eq!(queues.active(), 0);

        queues.dispatch(text_update(2, 7, "again"));
        assert_eq!(rx.recv().await.unwrap().1, "again");
    }
}
