//! Error type shared by the sources, the durable store and configuration loading.
//!
//! The controller never surfaces these to the host directly; failures become
//! status text and log events instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status, rendered like `404 Not Found`
    #[error("{status}")]
    Status { status: String, body: String },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Shape(String),

    #[error("favorite toggle rejected: {0}")]
    ToggleRejected(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unable to resolve local data directory")]
    NoDataDirectory,
}

impl BrowserError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
