/// Why a backend call produced no traces.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No response within the configured timeout.
    #[error("backend request timed out")]
    Timeout,

    /// Connection or transport failure before a status was received.
    #[error("backend unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// The runtime answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not a JSON trace array.
    #[error("backend response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Unavailable(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
