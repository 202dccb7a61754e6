use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body returned by the remote API for non-200 responses.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub url: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find any valid auth key file")]
    NoCredentials,

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no any results for the dork")]
    NoResults,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("fetch task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;
