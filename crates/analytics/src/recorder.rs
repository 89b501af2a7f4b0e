use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use {chrono::Utc, flowrelay_protocol::InteractionResult, tracing::debug};

use crate::types::{
    AnalyticsRecord, GlobalMetrics, InboundMessage, MessageOrigin, ResponseSummary, UserMetrics,
};

#[derive(Debug)]
struct UserEntry {
    metrics: UserMetrics,
    /// Button labels shown at the end of the user's previous turn.
    last_labels: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserEntry>,
    log: Vec<AnalyticsRecord>,
}

/// Append-only interaction log plus per-user counters behind one lock.
#[derive(Debug, Default)]
pub struct AnalyticsRecorder {
    inner: Mutex<Inner>,
}

impl AnalyticsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed turn.
    ///
    /// A button press always counts as a click. Typed text counts as one when
    /// it equals a label the previous turn offered.
    pub fn record(
        &self,
        user_id: &str,
        inbound: &InboundMessage,
        result: &InteractionResult,
        latency: Duration,
    ) {
        let now = Utc::now();
        let record = AnalyticsRecord {
            timestamp: now,
            user_id: user_id.to_string(),
            user_message: inbound.text.clone(),
            origin: inbound.origin,
            response: ResponseSummary::from(result),
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        };

        let mut inner = self.lock();
        let entry = inner
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntry {
                metrics: UserMetrics::new(now),
                last_labels: Vec::new(),
            });

        let clicked = match inbound.origin {
            MessageOrigin::Button => true,
            MessageOrigin::Typed => entry.last_labels.iter().any(|l| *l == inbound.text),
        };

        let metrics = &mut entry.metrics;
        metrics.total_messages += 1;
        metrics.total_interactions += 1;
        metrics.last_interaction = now;
        if clicked {
            metrics.button_clicks += 1;
        }
        if result.image_url.is_some() {
            metrics.images_received += 1;
        }
        entry.last_labels = result.button_labels().map(str::to_string).collect();

        debug!(
            user_id,
            clicked,
            latency_ms = record.latency_ms,
            "interaction recorded"
        );
        inner.log.push(record);
    }

    #[must_use]
    pub fn get_user_metrics(&self, user_id: &str) -> Option<UserMetrics> {
        self.lock()
            .users
            .get(user_id)
            .map(|entry| entry.metrics.clone())
    }

    #[must_use]
    pub fn get_global_metrics(&self) -> GlobalMetrics {
        let inner = self.lock();
        let total_users = inner.users.len();
        let mut totals = GlobalMetrics {
            total_users,
            total_messages: 0,
            total_button_clicks: 0,
            total_images: 0,
            average_messages_per_user: 0.0,
        };
        for entry in inner.users.values() {
            totals.total_messages += entry.metrics.total_messages;
            totals.total_button_clicks += entry.metrics.button_clicks;
            totals.total_images += entry.metrics.images_received;
        }
        if total_users > 0 {
            totals.average_messages_per_user = totals.total_messages as f64 / total_users as f64;
        }
        totals
    }

    /// Copy of the interaction log, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AnalyticsRecord> {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
