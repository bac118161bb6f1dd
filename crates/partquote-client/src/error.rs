use std::path::PathBuf;

use partquote_core::{LineValidationError, SelectionError};
use thiserror::Error;

/// Errors returned by the offer API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status. `message` comes from the
    /// error envelope when one was sent.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The session could not be refreshed; tokens were cleared and the
    /// caller has to sign in again.
    #[error("session expired; sign in again")]
    Unauthorized,

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Validation(#[from] LineValidationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("no draft line at index {index} ({len} line(s))")]
    LineIndexOutOfRange { index: usize, len: usize },

    /// A submit for the same form is already in flight.
    #[error("a submission is already in progress")]
    SubmitInProgress,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the local keyed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value for '{key}' is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
