use thiserror::Error;

use vouch_drafts::{PublishError, StorageError, StoreError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an `{error, message}` body.
    #[error("{code}: {message} (status {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request failed with status {0}")]
    Status(u16),

    #[error("no authenticated session")]
    NotAuthenticated,

    /// Rejected locally, no request was sent.
    #[error(transparent)]
    Invalid(#[from] PublishError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::Status(status) => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Invalid(e) => Some(e.code()),
            _ => None,
        }
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err.status() {
            Some(409) => StoreError::Conflict(err.to_string()),
            Some(404) => StoreError::NotFound(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}
