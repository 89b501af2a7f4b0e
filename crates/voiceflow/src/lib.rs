//! Conversational backend client.
//!
//! [`ConversationBackend`] is what the chat layer talks to; [`VoiceflowClient`]
//! implements it against the Voiceflow dialog-manager runtime API.

pub mod client;
pub mod error;

use {
    async_trait::async_trait,
    flowrelay_protocol::{InteractRequest, RawTrace},
};

pub use {
    client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, VoiceflowClient},
    error::{BackendError, Result},
};

/// A conversational runtime that answers a request with an ordered trace list.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Advance the user's conversation by one request.
    async fn interact(&self, user_id: &str, request: &InteractRequest) -> Result<Vec<RawTrace>>;

    /// Ask the runtime to persist the user's transcript. Best effort; a no-op
    /// when the backend has nowhere to put it.
    async fn save_transcript(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }
}
