use thiserror::Error;

/// Internal turn-processing error.
///
/// These never reach a channel: the turn boundary converts every variant
/// into a generic apology response and logs the detail.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Identity(#[from] voltaic_identity::Error),

    #[error(transparent)]
    Sessions(#[from] voltaic_sessions::Error),

    #[error(transparent)]
    Media(#[from] voltaic_media::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

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
