//! Turn orchestration.
//!
//! A turn is: record the user's message, call the backend with the session
//! context, normalize, render, then fold the result back into the session and
//! analytics. Only a backend failure ends a turn early; everything after the
//! backend call degrades instead of failing.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    dashmap::DashMap,
    flowrelay_analytics::{AnalyticsRecorder, InboundMessage},
    flowrelay_channels::{
        ChannelEventSink, ChannelOutbound, ChannelReplyTarget, Error as ChannelError,
        InboundEvent, InboundKind,
    },
    flowrelay_protocol::{ButtonSpec, InteractRequest, normalize},
    flowrelay_sessions::SessionStore,
    flowrelay_voiceflow::{BackendError, ConversationBackend},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{chat as chat_metrics, counter, histogram, labels};

use crate::{
    buttons::ButtonRegistry,
    commands::{self, Command},
    render::render,
};

pub const TIMEOUT_APOLOGY: &str = "Connection timeout. Please try again.";
pub const BACKEND_APOLOGY: &str = "Failed to communicate with Voiceflow. Please try again.";
pub const SELECTION_APOLOGY: &str =
    "Sorry, there was an error processing your selection. Please try again.";

/// Runs turns and commands for every user.
///
/// Each user has an async gate held for the whole of their turn, so turns for
/// one user never overlap and run in the order they reach the gate. Different
/// users never share a gate. A gate lives until the user's `/clear`.
pub struct ChatOrchestrator {
    backend: Arc<dyn ConversationBackend>,
    outbound: Arc<dyn ChannelOutbound>,
    sessions: Arc<SessionStore>,
    analytics: Arc<AnalyticsRecorder>,
    save_transcripts: bool,
    buttons: ButtonRegistry,
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatOrchestrator {
    pub fn new(
        backend: Arc<dyn ConversationBackend>,
        outbound: Arc<dyn ChannelOutbound>,
        sessions: Arc<SessionStore>,
        analytics: Arc<AnalyticsRecorder>,
    ) -> Self {
        Self {
            backend,
            outbound,
            sessions,
            analytics,
            save_transcripts: true,
            buttons: ButtonRegistry::new(),
            gates: DashMap::new(),
        }
    }

    /// Whether to ask the backend to persist a transcript after each turn.
    #[must_use]
    pub fn with_transcripts(mut self, enabled: bool) -> Self {
        self.save_transcripts = enabled;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn analytics(&self) -> &Arc<AnalyticsRecorder> {
        &self.analytics
    }

    #[must_use]
    pub fn buttons(&self) -> &ButtonRegistry {
        &self.buttons
    }

    /// Run one turn for a typed message or a button press.
    pub async fn handle_turn(&self, event: InboundEvent) {
        let InboundEvent {
            user_id,
            chat_id,
            kind,
            ..
        } = event;
        let (user_id, chat_id) = (user_id.as_str(), chat_id.as_str());

        let (inbound, request) = match kind {
            InboundKind::Text { text } => {
                let request = InteractRequest::text(&text);
                (InboundMessage::typed(text), request)
            },
            InboundKind::Button { token, callback_id } => {
                if let Err(e) = self.outbound.acknowledge(&callback_id).await {
                    debug!(user_id, error = %e, "failed to acknowledge button press");
                }
                match self.buttons.resolve(user_id, &token) {
                    Ok(button) => {
                        let request = InteractRequest::button(&button);
                        (InboundMessage::button(button.label), request)
                    },
                    Err(e) => {
                        warn!(user_id, chat_id, error = %e, "undecodable button token");
                        self.reply(chat_id, SELECTION_APOLOGY).await;
                        return;
                    },
                }
            },
        };

        let gate = self.gate(user_id);
        let _turn = gate.lock().await;
        let started = Instant::now();

        info!(user_id, chat_id, origin = ?inbound.origin, "turn started");
        self.sessions.append_history(user_id, inbound.text.clone(), true);
        let request = request.with_context(self.sessions.context(user_id));

        if let Err(e) = self.outbound.send_typing(chat_id).await {
            debug!(chat_id, error = %e, "typing indicator failed");
        }

        let traces = match self.backend.interact(user_id, &request).await {
            Ok(traces) => traces,
            Err(e) => {
                self.abort_turn(user_id, chat_id, &e, started.elapsed()).await;
                return;
            },
        };

        let result = normalize(&traces);
        let issue = |button: &ButtonSpec| self.buttons.issue(user_id, button);
        let outcome = render(self.outbound.as_ref(), chat_id, &result, &issue).await;

        if self.save_transcripts {
            self.spawn_transcript(user_id);
        }

        self.sessions.update_context(user_id, result.context_patch.clone());
        if let Some(said) = result.transcript() {
            self.sessions.append_history(user_id, said, false);
        }

        let latency = started.elapsed();
        self.analytics.record(user_id, &inbound, &result, latency);

        info!(
            user_id,
            chat_id,
            traces = traces.len(),
            sent = outcome.sent,
            failed = outcome.failed,
            dropped_buttons = outcome.dropped_buttons,
            latency_ms = latency.as_millis() as u64,
            "turn complete"
        );
        #[cfg(feature = "metrics")]
        {
            counter!(chat_metrics::TURNS_TOTAL, labels::OUTCOME => "ok").increment(1);
            histogram!(chat_metrics::TURN_DURATION_SECONDS).record(latency.as_secs_f64());
        }
    }

    /// Run a slash command and return the reply text.
    pub async fn run_command(&self, command: Command, user_id: &str) -> String {
        #[cfg(feature = "metrics")]
        counter!(chat_metrics::COMMANDS_TOTAL, labels::COMMAND => command.name()).increment(1);

        match command {
            Command::Start => {
                info!(user_id, "user started the bot");
                commands::welcome_text()
            },
            Command::Clear => {
                let gate = self.gate(user_id);
                let turn = gate.lock().await;
                self.sessions.clear(user_id);
                drop(turn);
                drop(gate);
                // Keep the gate if another turn is already holding or waiting on it.
                self.gates
                    .remove_if(user_id, |_, gate| Arc::strong_count(gate) == 1);
                commands::CLEARED_TEXT.to_string()
            },
            Command::Stats => {
                let metrics = self.analytics.get_user_metrics(user_id);
                commands::stats_text(metrics.as_ref())
            },
        }
    }

    async fn abort_turn(
        &self,
        user_id: &str,
        chat_id: &str,
        error: &BackendError,
        elapsed: Duration,
    ) {
        warn!(
            user_id,
            chat_id,
            error_type = error.kind(),
            error = %error,
            elapsed_ms = elapsed.as_millis() as u64,
            "backend call failed, turn aborted"
        );
        #[cfg(feature = "metrics")]
        counter!(chat_metrics::TURNS_TOTAL, labels::OUTCOME => "backend_error").increment(1);

        let apology = if error.is_timeout() {
            TIMEOUT_APOLOGY
        } else {
            BACKEND_APOLOGY
        };
        self.reply(chat_id, apology).await;
    }

    fn spawn_transcript(&self, user_id: &str) {
        let backend = Arc::clone(&self.backend);
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = backend.save_transcript(&user_id).await {
                warn!(user_id, error = %e, "failed to save transcript");
            }
        });
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.outbound.send_text(chat_id, text, None).await {
            warn!(chat_id, error = %e, "failed to send reply");
        }
    }

    fn gate(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(user_id.to_string())
            .or_default()
            .value()
            .clone()
    }
}

#[async_trait]
impl ChannelEventSink for ChatOrchestrator {
    async fn dispatch_to_chat(&self, event: InboundEvent) {
        self.handle_turn(event).await;
    }

    async fn dispatch_command(
        &self,
        command: &str,
        reply_to: ChannelReplyTarget,
    ) -> flowrelay_channels::Result<String> {
        let Some(parsed) = Command::parse(command) else {
            return Err(ChannelError::invalid_input(format!(
                "unknown command: {command}"
            )));
        };
        Ok(self.run_command(parsed, &reply_to.user_id).await)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            render::RENDER_APOLOGY,
            test_support::{MockBackend, RecordingOutbound, Sent},
        },
        flowrelay_protocol::{ButtonSpec, RawTrace, encode_token},
        serde_json::{Map, Value, json},
        tokio::sync::Notify,
    };

    struct Harness {
        orchestrator: Arc<ChatOrchestrator>,
        backend: Arc<MockBackend>,
        outbound: Arc<RecordingOutbound>,
    }

    fn harness(backend: MockBackend) -> Harness {
        harness_with(backend, RecordingOutbound::default())
    }

    fn harness_with(backend: MockBackend, outbound: RecordingOutbound) -> Harness {
        let backend = Arc::new(backend);
        let outbound = Arc::new(outbound);
        let orchestrator = ChatOrchestrator::new(
            backend.clone(),
            outbound.clone(),
            Arc::new(SessionStore::new()),
            Arc::new(AnalyticsRecorder::new()),
        );
        Harness {
            orchestrator: Arc::new(orchestrator),
            backend,
            outbound,
        }
    }

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn greeting() -> Value {
        json!([
            { "type": "text", "payload": { "message": "Hello! What can I do?" } },
            { "type": "choice", "payload": { "buttons": [
                { "name": "Pricing" }, { "name": "Support" },
            ] } },
            { "type": "context", "payload": { "step": "menu" } },
        ])
    }

    #[tokio::test]
    async fn text_turn_runs_end_to_end() {
        let h = harness(MockBackend::replying(greeting()));
        h.orchestrator
            .sessions()
            .update_context("42", context(json!({ "locale": "en" })));

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;

        let requests = h.backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "42");
        assert_eq!(
            serde_json::to_value(&requests[0].1).unwrap(),
            json!({
                "request": { "type": "text", "payload": "hi" },
                "context": { "locale": "en" },
            })
        );

        let sent = h.outbound.sent();
        assert_eq!(sent[0], Sent::Typing("100".into()));
        let Sent::Text { to, text, buttons } = &sent[1] else {
            panic!("expected text, got {sent:?}");
        };
        assert_eq!(to, "100");
        assert_eq!(text, "Hello! What can I do?");
        assert_eq!(buttons.as_ref().unwrap().len(), 2);

        let session = h.orchestrator.sessions().get_or_create("42");
        assert_eq!(session.context["step"], json!("menu"));
        assert_eq!(session.context["locale"], json!("en"));
        let history: Vec<(&str, bool)> = session
            .history
            .iter()
            .map(|e| (e.message.as_str(), e.is_user))
            .collect();
        assert_eq!(history, vec![
            ("hi", true),
            ("Hello! What can I do?", false)
        ]);

        let metrics = h.orchestrator.analytics().get_user_metrics("42").unwrap();
        assert_eq!(metrics.total_messages, 1);
        assert_eq!(h.orchestrator.analytics().records().len(), 1);
    }

    #[tokio::test]
    async fn button_press_replays_stored_request() {
        let h = harness(MockBackend::replying(greeting()));
        let button = ButtonSpec::new(
            "Pricing",
            json!({ "type": "path-1", "payload": { "label": "Pricing" } }),
        );
        let token = encode_token(&button).unwrap();

        h.orchestrator
            .handle_turn(InboundEvent::button("42", "100", token, "cb-1"))
            .await;

        assert_eq!(h.outbound.sent()[0], Sent::Ack("cb-1".into()));
        assert_eq!(h.backend.requests()[0].1.request, button.request);
        let metrics = h.orchestrator.analytics().get_user_metrics("42").unwrap();
        assert_eq!(metrics.button_clicks, 1);
        assert_eq!(
            h.orchestrator.sessions().get_or_create("42").history[0].message,
            "Pricing"
        );
    }

    #[tokio::test]
    async fn runtime_path_buttons_survive_a_round_trip() {
        let pricing = json!({
            "type": "path-65f0c2a1b3d4e5f6a7b8c9d0",
            "payload": { "label": "Pricing", "actions": [] },
        });
        let h = harness(MockBackend::replying(json!([
            { "type": "text", "payload": { "message": "How can I help?" } },
            { "type": "choice", "payload": { "buttons": [
                { "name": "Pricing", "request": pricing },
                { "name": "Support", "request": {
                    "type": "path-65f0c2a1b3d4e5f6a7b8c9d1",
                    "payload": { "label": "Support", "actions": [] },
                } },
            ] } },
        ])));

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        let sent = h.outbound.sent();
        let Sent::Text {
            buttons: Some(grid),
            ..
        } = &sent[1]
        else {
            panic!("expected buttons, got {sent:?}");
        };
        assert_eq!(grid.len(), 2);
        let token = grid.rows()[0][0].token.clone();

        h.orchestrator
            .handle_turn(InboundEvent::button("42", "100", token, "cb-1"))
            .await;

        let requests = h.backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].1.request, pricing);
        let metrics = h.orchestrator.analytics().get_user_metrics("42").unwrap();
        assert_eq!(metrics.button_clicks, 1);
    }

    #[tokio::test]
    async fn forgotten_reference_gets_selection_apology() {
        let h = harness(MockBackend::replying(greeting()));

        h.orchestrator
            .handle_turn(InboundEvent::button("42", "100", "#999", "cb-3"))
            .await;

        assert!(h.backend.requests().is_empty());
        assert_eq!(h.outbound.texts(), vec![SELECTION_APOLOGY.to_string()]);
    }

    #[tokio::test]
    async fn clear_releases_the_user_gate() {
        let h = harness(MockBackend::replying(greeting()));
        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        assert!(h.orchestrator.gates.contains_key("42"));

        h.orchestrator.run_command(Command::Clear, "42").await;

        assert!(!h.orchestrator.gates.contains_key("42"));
    }

    #[tokio::test]
    async fn clear_keeps_a_gate_that_is_in_use() {
        let h = harness(MockBackend::replying(greeting()));
        let held = h.orchestrator.gate("42");

        h.orchestrator.run_command(Command::Clear, "42").await;

        assert!(h.orchestrator.gates.contains_key("42"));
        drop(held);
    }

    #[tokio::test]
    async fn bad_token_is_acknowledged_and_apologized_for() {
        let h = harness(MockBackend::replying(greeting()));

        h.orchestrator
            .handle_turn(InboundEvent::button("42", "100", "{not json", "cb-2"))
            .await;

        assert!(h.backend.requests().is_empty());
        assert_eq!(h.outbound.sent(), vec![
            Sent::Ack("cb-2".into()),
            Sent::Text {
                to: "100".into(),
                text: SELECTION_APOLOGY.into(),
                buttons: None,
            },
        ]);
        assert!(h.orchestrator.analytics().records().is_empty());
    }

    #[tokio::test]
    async fn timeout_aborts_turn_with_one_apology() {
        let h = harness(MockBackend::failing(|| BackendError::Timeout));
        h.orchestrator
            .sessions()
            .update_context("42", context(json!({ "step": "pricing" })));

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hello?"))
            .await;

        assert_eq!(h.outbound.texts(), vec![TIMEOUT_APOLOGY.to_string()]);
        assert!(h.orchestrator.analytics().records().is_empty());
        assert!(h.orchestrator.analytics().get_user_metrics("42").is_none());

        let session = h.orchestrator.sessions().get_or_create("42");
        assert_eq!(session.context, context(json!({ "step": "pricing" })));
        assert_eq!(session.history.len(), 1);
        assert!(session.history[0].is_user);
        assert_eq!(h.backend.transcripts(), 0);
    }

    #[tokio::test]
    async fn protocol_error_gets_generic_apology() {
        let h = harness(MockBackend::failing(|| BackendError::Status {
            status: 500,
            body: "boom".into(),
        }));

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;

        assert_eq!(h.outbound.texts(), vec![BACKEND_APOLOGY.to_string()]);
        assert!(h.orchestrator.analytics().records().is_empty());
    }

    #[tokio::test]
    async fn render_failure_still_completes_turn() {
        let h = harness_with(
            MockBackend::replying(json!([
                { "type": "visual", "payload": { "image": "https://img/x.png" } },
                { "type": "text", "payload": { "message": "See above" } },
                { "type": "context", "payload": { "seen": true } },
            ])),
            RecordingOutbound::failing_photos(),
        );

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "show me"))
            .await;

        assert_eq!(h.outbound.texts(), vec![
            "See above".to_string(),
            RENDER_APOLOGY.to_string()
        ]);
        assert_eq!(
            h.orchestrator.sessions().context("42")["seen"],
            json!(true)
        );
        let metrics = h.orchestrator.analytics().get_user_metrics("42").unwrap();
        assert_eq!(metrics.images_received, 1);
    }

    #[tokio::test]
    async fn transcript_failure_is_swallowed() {
        let h = harness(MockBackend::replying(greeting()).with_failing_transcripts());

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        // Let the detached transcript task run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.backend.transcripts(), 1);
        assert_eq!(h.outbound.texts(), vec!["Hello! What can I do?".to_string()]);
        assert_eq!(h.orchestrator.analytics().records().len(), 1);
    }

    #[tokio::test]
    async fn transcripts_can_be_disabled() {
        let backend = Arc::new(MockBackend::replying(greeting()));
        let orchestrator = ChatOrchestrator::new(
            backend.clone(),
            Arc::new(RecordingOutbound::default()),
            Arc::new(SessionStore::new()),
            Arc::new(AnalyticsRecorder::new()),
        )
        .with_transcripts(false);

        orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        tokio::task::yield_now().await;

        assert_eq!(backend.transcripts(), 0);
    }

    #[tokio::test]
    async fn typed_label_from_previous_turn_counts_as_click() {
        let h = harness(MockBackend::replying(greeting()));

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "Support"))
            .await;

        let metrics = h.orchestrator.analytics().get_user_metrics("42").unwrap();
        assert_eq!(metrics.total_messages, 2);
        assert_eq!(metrics.button_clicks, 1);
    }

    #[tokio::test]
    async fn commands_reply_and_clear_resets_session() {
        let h = harness(MockBackend::replying(greeting()));
        let target = ChannelReplyTarget {
            user_id: "42".into(),
            chat_id: "100".into(),
        };

        let stats = h
            .orchestrator
            .dispatch_command("stats", target.clone())
            .await
            .unwrap();
        assert_eq!(stats, commands::NO_STATS_TEXT);

        h.orchestrator
            .handle_turn(InboundEvent::text("42", "100", "hi"))
            .await;
        let stats = h
            .orchestrator
            .dispatch_command("/stats", target.clone())
            .await
            .unwrap();
        assert!(stats.contains("Total messages: 1"));

        let reply = h
            .orchestrator
            .dispatch_command("clear", target.clone())
            .await
            .unwrap();
        assert_eq!(reply, commands::CLEARED_TEXT);
        let session = h.orchestrator.sessions().get_or_create("42");
        assert!(session.context.is_empty());
        assert!(session.history.is_empty());

        let welcome = h
            .orchestrator
            .dispatch_command("start", target.clone())
            .await
            .unwrap();
        assert!(welcome.contains("/clear - Clear your session"));

        assert!(matches!(
            h.orchestrator.dispatch_command("help", target).await,
            Err(ChannelError::InvalidInput { .. })
        ));
    }

    #[derive(Default)]
    struct GatedBackend {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ConversationBackend for GatedBackend {
        async fn interact(
            &self,
            user_id: &str,
            _request: &InteractRequest,
        ) -> flowrelay_voiceflow::Result<Vec<RawTrace>> {
            if user_id == "slow" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(vec![RawTrace::new("text", json!({ "message": "done" }))])
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn different_users_do_not_block_each_other() {
        let backend = Arc::new(GatedBackend::default());
        let orchestrator = Arc::new(ChatOrchestrator::new(
            backend.clone(),
            Arc::new(RecordingOutbound::default()),
            Arc::new(SessionStore::new()),
            Arc::new(AnalyticsRecorder::new()),
        ));

        let slow = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                orchestrator
                    .handle_turn(InboundEvent::text("slow", "1", "hi"))
                    .await;
            }
        });
        backend.entered.notified().await;

        tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.handle_turn(InboundEvent::text("fast", "2", "hi")),
        )
        .await
        .expect("fast user was blocked by slow user");
        assert!(!slow.is_finished());

        backend.release.notify_one();
        slow.await.unwrap();
        assert_eq!(orchestrator.analytics().get_global_metrics().total_users, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_user_turns_are_serialized() {
        let backend = MockBackend::new(|_, request| {
            let echo = format!("echo {}", request.request["payload"]);
            Ok(vec![RawTrace::new("text", json!({ "message": echo }))])
        })
        .with_delay(Duration::from_millis(20));
        let h = harness(backend);

        let turns: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|text| {
                let orchestrator = Arc::clone(&h.orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .handle_turn(InboundEvent::text("42", "100", text))
                        .await;
                })
            })
            .collect();
        for turn in turns {
            turn.await.unwrap();
        }

        let history = h.orchestrator.sessions().get_or_create("42").history;
        assert_eq!(history.len(), 6);
        for pair in history.chunks(2) {
            assert!(pair[0].is_user);
            assert!(!pair[1].is_user);
            assert_eq!(pair[1].message, format!("echo \"{}\"", pair[0].message));
        }
    }
}
