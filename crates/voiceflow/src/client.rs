use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    flowrelay_protocol::{InteractRequest, RawTrace, TranscriptRequest, VERSION_ID},
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{backend as backend_metrics, counter, histogram, labels};

use crate::{BackendError, ConversationBackend, Result};

pub const DEFAULT_BASE_URL: &str = "https://general-runtime.voiceflow.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the Voiceflow runtime.
#[derive(Debug)]
pub struct VoiceflowClient {
    client: Client,
    api_key: Secret<String>,
    base_url: String,
    project_id: Option<String>,
}

impl VoiceflowClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(api_key: Secret<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Unavailable)?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: None,
        })
    }

    /// Enable transcript persistence for this project.
    #[must_use]
    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id.filter(|id| !id.is_empty());
        self
    }

    fn interact_url(&self, user_id: &str) -> String {
        format!("{}/state/user/{user_id}/interact", self.base_url)
    }

    async fn post_interact(
        &self,
        user_id: &str,
        request: &InteractRequest,
    ) -> Result<Vec<RawTrace>> {
        let resp = self
            .client
            .post(self.interact_url(user_id))
            .header("Authorization", self.api_key.expose_secret())
            .header("versionID", VERSION_ID)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ConversationBackend for VoiceflowClient {
    async fn interact(&self, user_id: &str, request: &InteractRequest) -> Result<Vec<RawTrace>> {
        let started = Instant::now();
        #[cfg(feature = "metrics")]
        counter!(backend_metrics::REQUESTS_TOTAL).increment(1);

        let result = self.post_interact(user_id, request).await;

        #[cfg(feature = "metrics")]
        histogram!(backend_metrics::REQUEST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(traces) => debug!(
                user_id,
                traces = traces.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "voiceflow interact ok"
            ),
            Err(e) => {
                warn!(user_id, error_type = e.kind(), error = %e, "voiceflow interact failed");
                #[cfg(feature = "metrics")]
                counter!(backend_metrics::ERRORS_TOTAL, labels::ERROR_TYPE => e.kind())
                    .increment(1);
            },
        }
        result
    }

    async fn save_transcript(&self, user_id: &str) -> Result<()> {
        let Some(project_id) = &self.project_id else {
            debug!(user_id, "no project id configured, transcript not saved");
            return Ok(());
        };

        let resp = self
            .client
            .put(format!("{}/transcripts", self.base_url))
            .header("Authorization", self.api_key.expose_secret())
            .json(&TranscriptRequest::new(project_id.as_str(), user_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            #[cfg(feature = "metrics")]
            counter!(backend_metrics::TRANSCRIPT_FAILURES_TOTAL).increment(1);
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        debug!(user_id, "transcript saved");
        Ok(())
    }
}
