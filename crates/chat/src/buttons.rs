//! Callback data for rendered buttons.
//!
//! A button whose request fits in the callback data travels inline. Runtime
//! path buttons carry requests far larger than Telegram allows, so those are
//! remembered here per user and the button carries a short reference instead.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use {
    dashmap::DashMap,
    flowrelay_protocol::{
        ButtonSpec, CallbackError, CallbackToken, encode_token, parse_token, reference_token,
    },
    tracing::debug,
};

/// How many referenced buttons are kept per user. Older ones stop resolving.
pub const REMEMBERED_BUTTONS_PER_USER: usize = 64;

#[derive(Debug)]
pub struct ButtonRegistry {
    next_id: AtomicU64,
    per_user: usize,
    users: DashMap<String, VecDeque<(u64, ButtonSpec)>>,
}

impl Default for ButtonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(REMEMBERED_BUTTONS_PER_USER)
    }

    #[must_use]
    pub fn with_capacity(per_user: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            per_user: per_user.max(1),
            users: DashMap::new(),
        }
    }

    /// Callback data for `button` shown to `user_id`.
    pub fn issue(&self, user_id: &str, button: &ButtonSpec) -> Result<String, CallbackError> {
        let len = match encode_token(button) {
            Err(CallbackError::TooLong { len }) => len,
            other => return other,
        };

        let mut remembered = self.users.entry(user_id.to_string()).or_default();
        if let Some((id, _)) = remembered.iter().find(|(_, kept)| kept == button) {
            return Ok(reference_token(*id));
        }
        if remembered.len() >= self.per_user {
            remembered.pop_front();
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        remembered.push_back((id, button.clone()));
        debug!(user_id, id, len, label = %button.label, "button kept by reference");
        Ok(reference_token(id))
    }

    /// The button a press on `token` stands for.
    pub fn resolve(&self, user_id: &str, token: &str) -> Result<ButtonSpec, CallbackError> {
        match parse_token(token)? {
            CallbackToken::Inline(button) => Ok(button),
            CallbackToken::Reference(id) => self
                .users
                .get(user_id)
                .and_then(|remembered| {
                    remembered
                        .iter()
                        .find(|(kept, _)| *kept == id)
                        .map(|(_, button)| button.clone())
                })
                .ok_or(CallbackError::UnknownReference { id }),
        }
    }

    /// Number of buttons kept for `user_id`.
    #[must_use]
    pub fn remembered(&self, user_id: &str) -> usize {
        self.users.get(user_id).map_or(0, |r| r.len())
    }
}
