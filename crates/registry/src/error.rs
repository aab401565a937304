use thiserror::Error;

/// Failure of a single operation invocation, as surfaced by handlers.
///
/// Variants are deliberately coarse: the agent translates them into fixed
/// user-facing text and must never leak handler internals to a channel.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("invalid input: {message}")]
    Invalid { message: String },

    #[error("internal: {message}")]
    Internal { message: String },
}

impl OperationError {
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Registry construction/validation errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation path not registered: {path}")]
    UnknownPath { path: String },
}

pub type Result<T> = std::result::Result<T, Error>;
