//! Custom error types for the forum client

use thiserror::Error;

/// Custom error type for client actions
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never completed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// A 2xx response body did not have the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// The action needs a signed-in user
    #[error("not signed in")]
    NotAuthenticated,

    /// The result arrived after the view moved on and was discarded
    #[error("result superseded by a newer view")]
    Superseded,

    /// Persisted session could not be read or written
    #[error("session store error: {0}")]
    Store(#[from] common::error::StoreError),
}

impl ClientError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// HTTP status of a backend rejection, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the user should be told about this error
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, ClientError::Superseded)
    }
}

/// Type alias for client results
pub type ClientResult<T> = Result<T, ClientError>;
