//! Error types shared across the client.

use thiserror::Error;

use crate::service::ServiceError;

/// Failure of a session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Input rejected locally, before any request was made.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        SessionError::Validation(message.into())
    }

    /// Text to show the user.
    pub fn reason(&self) -> String {
        match self {
            SessionError::Validation(msg) => msg.clone(),
            SessionError::Service(err) => err.reason(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Unusable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a data directory; set TASKBOARD_STORE or HOME")]
    NoDataDir,

    #[error("invalid API URL '{0}': must start with http:// or https://")]
    InvalidApiUrl(String),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
