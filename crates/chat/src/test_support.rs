//! Hand-written transport and backend doubles shared by the chat tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    flowrelay_channels::{ButtonGrid, ChannelOutbound, Error as ChannelError},
    flowrelay_protocol::{InteractRequest, RawTrace},
    flowrelay_voiceflow::{BackendError, ConversationBackend},
    serde_json::Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Text {
        to: String,
        text: String,
        buttons: Option<ButtonGrid>,
    },
    Photo {
        to: String,
        url: String,
        caption: Option<String>,
    },
    Ack(String),
    Typing(String),
}

/// Records what reached the user. Photos can be made to fail.
#[derive(Default)]
pub(crate) struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
    fail_photos: bool,
}

impl RecordingOutbound {
    pub fn failing_photos() -> Self {
        Self {
            fail_photos: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Text messages only, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        buttons: Option<&ButtonGrid>,
    ) -> flowrelay_channels::Result<()> {
        self.push(Sent::Text {
            to: to.to_string(),
            text: text.to_string(),
            buttons: buttons.cloned(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        to: &str,
        url: &str,
        caption: Option<&str>,
        _buttons: Option<&ButtonGrid>,
    ) -> flowrelay_channels::Result<()> {
        if self.fail_photos {
            return Err(ChannelError::rejected("wrong file identifier/HTTP URL specified"));
        }
        self.push(Sent::Photo {
            to: to.to_string(),
            url: url.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> flowrelay_channels::Result<()> {
        self.push(Sent::Ack(callback_id.to_string()));
        Ok(())
    }

    async fn send_typing(&self, to: &str) -> flowrelay_channels::Result<()> {
        self.push(Sent::Typing(to.to_string()));
        Ok(())
    }
}

type Responder =
    Box<dyn Fn(&str, &InteractRequest) -> flowrelay_voiceflow::Result<Vec<RawTrace>> + Send + Sync>;

/// Backend double answering from a closure.
pub(crate) struct MockBackend {
    respond: Responder,
    delay: Option<Duration>,
    fail_transcripts: bool,
    requests: Mutex<Vec<(String, InteractRequest)>>,
    transcripts: AtomicUsize,
}

impl MockBackend {
    pub fn new(
        respond: impl Fn(&str, &InteractRequest) -> flowrelay_voiceflow::Result<Vec<RawTrace>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            fail_transcripts: false,
            requests: Mutex::new(Vec::new()),
            transcripts: AtomicUsize::new(0),
        }
    }

    /// Always answer with `traces`.
    pub fn replying(traces: Value) -> Self {
        let traces: Vec<RawTrace> = serde_json::from_value(traces).unwrap();
        Self::new(move |_, _| Ok(traces.clone()))
    }

    pub fn failing(make: fn() -> BackendError) -> Self {
        Self::new(move |_, _| Err(make()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_failing_transcripts(mut self) -> Self {
        self.fail_transcripts = true;
        self
    }

    pub fn requests(&self) -> Vec<(String, InteractRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn transcripts(&self) -> usize {
        self.transcripts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationBackend for MockBackend {
    async fn interact(
        &self,
        user_id: &str,
        request: &InteractRequest,
    ) -> flowrelay_voiceflow::Result<Vec<RawTrace>> {
        self.requests
            .lock()
            .unwrap()
            .push((user_id.to_string(), request.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(user_id, request)
    }

    async fn save_transcript(&self, _user_id: &str) -> flowrelay_voiceflow::Result<()> {
        self.transcripts.fetch_add(1, Ordering::SeqCst);
        if self.fail_transcripts {
            return Err(BackendError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}
