use {teloxide::RequestError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] RequestError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Channel(#[from] flowrelay_channels::Error),

    #[error("invalid chat id {chat_id:?}")]
    InvalidChatId {
        chat_id: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Platform refusals (`Api`) reject one message. Network trouble and
/// exhausted rate-limit retries mean the platform is unavailable.
impl From<Error> for flowrelay_channels::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Channel(inner) => inner,
            Error::Telegram(RequestError::Api(api)) => Self::rejected(api),
            Error::Telegram(
                e @ (RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_)),
            ) => Self::unavailable(e),
            Error::Telegram(other) => Self::external("telegram request", other),
            Error::Reqwest(e) => Self::external("telegram http client", e),
            Error::InvalidChatId { chat_id, .. } => {
                Self::invalid_input(format!("invalid chat id {chat_id:?}"))
            },
            Error::Message { message } => Self::invalid_input(message),
        }
    }
}
