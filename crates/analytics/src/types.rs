use {
    chrono::{DateTime, Utc},
    flowrelay_protocol::InteractionResult,
    serde::Serialize,
};

/// How an inbound message reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Typed,
    Button,
}

/// The user side of a turn, as analytics sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    /// Typed text, or the label of the pressed button.
    pub text: String,
    pub origin: MessageOrigin,
}

impl InboundMessage {
    pub fn typed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: MessageOrigin::Typed,
        }
    }

    pub fn button(label: impl Into<String>) -> Self {
        Self {
            text: label.into(),
            origin: MessageOrigin::Button,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    pub text: Option<String>,
    pub has_buttons: bool,
    pub has_image: bool,
}

impl From<&InteractionResult> for ResponseSummary {
    fn from(result: &InteractionResult) -> Self {
        Self {
            text: result.text.clone(),
            has_buttons: result.button_labels().next().is_some(),
            has_image: result.image_url.is_some(),
        }
    }
}

/// One completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsRecord {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_message: String,
    pub origin: MessageOrigin,
    pub response: ResponseSummary,
    pub latency_ms: u64,
}

/// Running totals for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMetrics {
    pub total_messages: u64,
    pub total_interactions: u64,
    pub button_clicks: u64,
    pub images_received: u64,
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl UserMetrics {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_messages: 0,
            total_interactions: 0,
            button_clicks: 0,
            images_received: 0,
            first_interaction: now,
            last_interaction: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalMetrics {
    pub total_users: usize,
    pub total_messages: u64,
    pub total_button_clicks: u64,
    pub total_images: u64,
    pub average_messages_per_user: f64,
}
