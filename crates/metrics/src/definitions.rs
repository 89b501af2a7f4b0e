//! Metric name and label definitions.

/// Turn orchestration and rendering
pub mod chat {
    /// Completed turns, labelled by outcome (`ok`, `backend_error`)
    pub const TURNS_TOTAL: &str = "flowrelay_chat_turns_total";
    /// Wall time of one turn in seconds, backend call included
    pub const TURN_DURATION_SECONDS: &str = "flowrelay_chat_turn_duration_seconds";
    /// Render calls the chat platform rejected
    pub const RENDER_FAILURES_TOTAL: &str = "flowrelay_chat_render_failures_total";
    /// Buttons left out of a keyboard because their callback token was too long
    pub const BUTTONS_DROPPED_TOTAL: &str = "flowrelay_chat_buttons_dropped_total";
    /// Slash commands handled, labelled by command
    pub const COMMANDS_TOTAL: &str = "flowrelay_chat_commands_total";
}

/// Conversational backend calls
pub mod backend {
    /// Interact requests sent
    pub const REQUESTS_TOTAL: &str = "flowrelay_backend_requests_total";
    /// Interact request duration in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "flowrelay_backend_request_duration_seconds";
    /// Failed interact requests, labelled by error type
    pub const ERRORS_TOTAL: &str = "flowrelay_backend_errors_total";
    /// Transcript saves that failed
    pub const TRANSCRIPT_FAILURES_TOTAL: &str = "flowrelay_backend_transcript_failures_total";
}

/// Trace decoding
pub mod protocol {
    /// Traces skipped because their payload had the wrong shape
    pub const MALFORMED_TRACES_TOTAL: &str = "flowrelay_protocol_malformed_traces_total";
}

/// Session store
pub mod sessions {
    /// Sessions created
    pub const CREATED_TOTAL: &str = "flowrelay_sessions_created_total";
    /// Sessions currently held in memory
    pub const ACTIVE: &str = "flowrelay_sessions_active";
    /// Sessions removed by a reset
    pub const CLEARED_TOTAL: &str = "flowrelay_sessions_cleared_total";
}

/// Telegram transport
pub mod telegram {
    /// Updates received from Telegram, labelled by kind (`message`, `callback`)
    pub const UPDATES_RECEIVED_TOTAL: &str = "flowrelay_telegram_updates_received_total";
    /// Messages sent to Telegram
    pub const MESSAGES_SENT_TOTAL: &str = "flowrelay_telegram_messages_sent_total";
    /// Send errors
    pub const MESSAGE_SEND_ERRORS_TOTAL: &str = "flowrelay_telegram_message_send_errors_total";
    /// Sends that were retried after a rate limit
    pub const RATE_LIMIT_RETRIES_TOTAL: &str = "flowrelay_telegram_rate_limit_retries_total";
    /// HTML sends that fell back to plain text
    pub const PLAIN_TEXT_FALLBACKS_TOTAL: &str = "flowrelay_telegram_plain_text_fallbacks_total";
    /// Update polling duration
    pub const POLLING_DURATION_SECONDS: &str = "flowrelay_telegram_polling_duration_seconds";
}

/// Common label keys used across metrics
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const ERROR_TYPE: &str = "error_type";
    pub const KIND: &str = "kind";
    pub const COMMAND: &str = "command";
    pub const TRACE_KIND: &str = "trace_kind";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Backend and turn duration buckets (in seconds)
    /// Covers 10ms to 60s
    pub static REQUEST_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Long-poll duration buckets (in seconds)
    pub static POLLING_DURATION: Lazy<Vec<f64>> =
        Lazy::new(|| vec![0.1, 1.0, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0]);
}
