//! Error types for the helena-core library.

use thiserror::Error;

/// Failures while talking to the generative-AI backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// The backend answered, but not with anything usable.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything a non-HTTP backend wants to report.
    #[error("{0}")]
    Other(String),
}

/// Failures of the asset cache lifecycle.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A precache resource could not be fetched during install.
    #[error("failed to precache {url}: {reason}")]
    Population {
        url: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A manifest entry could not be resolved against the base URL.
    #[error("invalid resource url {0}")]
    InvalidUrl(String),
}

/// A specialized `Result` type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
