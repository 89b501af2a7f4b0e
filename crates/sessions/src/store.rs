use {
    dashmap::DashMap,
    serde_json::{Map, Value},
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{counter, gauge, sessions as session_metrics};

use crate::session::{HistoryEntry, Session};

/// Sessions keyed by user id.
///
/// Every mutation runs under the map's per-shard write lock, so two writes to
/// the same user never interleave, while users in other shards proceed
/// untouched. Sessions are created lazily and only removed by [`clear`].
///
/// [`clear`]: SessionStore::clear
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's session, creating an empty one on first access.
    pub fn get_or_create(&self, user_id: &str) -> Session {
        self.with_session(user_id, |session| session.clone())
    }

    /// Current context for the user.
    pub fn context(&self, user_id: &str) -> Map<String, Value> {
        self.with_session(user_id, |session| session.context.clone())
    }

    /// Merge `patch` into the stored context; keys in `patch` win.
    pub fn update_context(&self, user_id: &str, patch: Map<String, Value>) {
        if patch.is_empty() {
            return;
        }
        self.with_session(user_id, |session| {
            debug!(user_id, keys = patch.len(), "updating session context");
            session.context.extend(patch);
        });
    }

    pub fn append_history(&self, user_id: &str, message: impl Into<String>, is_user: bool) {
        let entry = HistoryEntry {
            message: message.into(),
            is_user,
            timestamp: chrono::Utc::now(),
        };
        self.with_session(user_id, |session| session.history.push(entry));
    }

    /// Drop the user's session. Returns whether there was one.
    pub fn clear(&self, user_id: &str) -> bool {
        let removed = self.sessions.remove(user_id).is_some();
        if removed {
            info!(user_id, "session cleared");
            #[cfg(feature = "metrics")]
            {
                counter!(session_metrics::CLEARED_TOTAL).increment(1);
                gauge!(session_metrics::ACTIVE).decrement(1.0);
            }
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn with_session<R>(&self, user_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!(user_id, "creating session");
                #[cfg(feature = "metrics")]
                {
                    counter!(session_metrics::CREATED_TOTAL).increment(1);
                    gauge!(session_metrics::ACTIVE).increment(1.0);
                }
                Session::new(user_id)
            });
        session.touch();
        f(&mut session)
    }
}
