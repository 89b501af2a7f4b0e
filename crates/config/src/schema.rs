//! Config schema: Telegram bot, conversation backend, metrics.
use std::net::SocketAddr;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_BACKEND_BASE_URL: &str = "https://general-runtime.voiceflow.com";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowrelayConfig {
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
    pub metrics: MetricsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Bot API root, for self-hosted Bot API servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Long-polling timeout for `getUpdates`.
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_url: None,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Conversation runtime connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,

    pub base_url: String,

    /// Needed for transcripts only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Per-request deadline.
    pub timeout_secs: u64,

    /// Save a transcript after each turn (requires `project_id`).
    pub transcripts: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            base_url: DEFAULT_BACKEND_BASE_URL.into(),
            project_id: None,
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            transcripts: true,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("transcripts", &self.transcripts)
            .finish()
    }
}

impl BackendConfig {
    /// Transcripts are saved only when enabled and a project is known.
    #[must_use]
    pub fn transcripts_active(&self) -> bool {
        self.transcripts && self.project_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Prometheus scrape address, e.g. `127.0.0.1:9464`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
