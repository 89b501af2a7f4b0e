use {
    chrono::{DateTime, Utc},
    serde::Serialize,
    serde_json::{Map, Value},
};

/// One line of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub message: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

/// State kept for one user between turns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user_id: String,
    /// Opaque runtime context, sent with every interact request.
    pub context: Map<String, Value>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            context: Map::new(),
            history: Vec::new(),
            created_at: now,
            last_seen: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}
