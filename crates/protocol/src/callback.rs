//! Button callback tokens.
//!
//! An inline token is a compact JSON array: `["label"]` for a button that
//! sends its label as text, `["label", request]` otherwise. Telegram caps
//! callback data at [`CALLBACK_TOKEN_MAX_BYTES`]; a button that does not fit
//! is refused rather than truncated, since a cut token would replay a corrupt
//! request. Such buttons are kept by the caller and sent as a reference token,
//! `#<id>`, which never collides with the JSON form.

use {serde_json::Value, thiserror::Error};

use crate::{CALLBACK_TOKEN_MAX_BYTES, interaction::ButtonSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("callback token is {len} bytes (limit {CALLBACK_TOKEN_MAX_BYTES})")]
    TooLong { len: usize },

    #[error("malformed callback token: {reason}")]
    Malformed { reason: String },

    #[error("button #{id} is no longer available")]
    UnknownReference { id: u64 },
}

impl CallbackError {
    fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::Malformed {
            reason: reason.to_string(),
        }
    }
}

const REFERENCE_PREFIX: char = '#';

/// What a callback token carries.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackToken {
    /// The whole button.
    Inline(ButtonSpec),
    /// A button kept by whoever issued the token.
    Reference(u64),
}

/// Token pointing at a button kept outside the callback data.
#[must_use]
pub fn reference_token(id: u64) -> String {
    format!("{REFERENCE_PREFIX}{id}")
}

/// Split callback data into an inline button or a reference.
pub fn parse_token(token: &str) -> Result<CallbackToken, CallbackError> {
    match token.strip_prefix(REFERENCE_PREFIX) {
        Some(id) => id
            .parse()
            .map(CallbackToken::Reference)
            .map_err(CallbackError::malformed),
        None => decode_token(token).map(CallbackToken::Inline),
    }
}

/// Encode a button as callback data.
pub fn encode_token(button: &ButtonSpec) -> Result<String, CallbackError> {
    let encoded = if button.is_plain_text() {
        serde_json::to_string(&[&button.label])
    } else {
        serde_json::to_string(&(&button.label, &button.request))
    };
    let token = encoded.map_err(CallbackError::malformed)?;

    if token.len() > CALLBACK_TOKEN_MAX_BYTES {
        return Err(CallbackError::TooLong { len: token.len() });
    }
    Ok(token)
}

/// Decode callback data back into the button that produced it.
pub fn decode_token(token: &str) -> Result<ButtonSpec, CallbackError> {
    if token.len() > CALLBACK_TOKEN_MAX_BYTES {
        return Err(CallbackError::TooLong { len: token.len() });
    }
    let parts: Vec<Value> = serde_json::from_str(token).map_err(CallbackError::malformed)?;
    let mut parts = parts.into_iter();
    let label = match parts.next() {
        Some(Value::String(label)) => label,
        Some(_) => return Err(CallbackError::malformed("label is not a string")),
        None => return Err(CallbackError::malformed("empty token")),
    };
    let button = match parts.next() {
        Some(request) => ButtonSpec::new(label, request),
        None => ButtonSpec::text(label),
    };
    if parts.next().is_some() {
        return Err(CallbackError::malformed("trailing elements"));
    }
    Ok(button)
}
