//! Conversational runtime wire types and the trace interpreter.
//!
//! The runtime answers every interaction with an ordered array of traces.
//! [`normalize`] folds that array into a single [`InteractionResult`] the chat
//! layer knows how to render. Buttons travel through Telegram as compact
//! [`callback`] tokens and come back as the exact [`ButtonSpec`] that was sent.

pub mod callback;
pub mod interaction;
pub mod normalize;
pub mod request;
pub mod trace;

pub use {
    callback::{
        CallbackError, CallbackToken, decode_token, encode_token, parse_token, reference_token,
    },
    interaction::{ButtonSpec, CardItem, InteractionResult},
    normalize::normalize,
    request::{InteractRequest, TranscriptRequest, text_request},
    trace::{MalformedTrace, RawTrace, TraceKind},
};

/// Runtime version targeted by every request.
pub const VERSION_ID: &str = "production";

/// Telegram rejects `callback_data` longer than this many bytes.
pub const CALLBACK_TOKEN_MAX_BYTES: usize = 64;
