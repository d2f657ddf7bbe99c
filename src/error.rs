//! Error types for the proxy-pilot crate.

use std::time::Duration;
use thiserror::Error;

/// Result alias used by the pool API.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pool to its callers.
///
/// Health-check failures are never reported through this type: they are
/// recorded as [`ValidationOutcome`](crate::ValidationOutcome)s and drive the
/// proxy state machine instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The pool was started without any proxy source.
    #[error("At least one proxy source is required")]
    NoSource,

    /// No proxy became available before the deadline.
    #[error("Timed out after {0:?} waiting for a proxy")]
    Timeout(Duration),

    /// The caller cancelled its wait.
    #[error("Wait for a proxy was cancelled")]
    Cancelled,

    /// The pool stopped while the caller was waiting.
    #[error("Proxy pool is stopped")]
    Stopped,

    /// Validation concurrency must be at least one worker.
    #[error("Validation concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    /// The configured validation URL could not be parsed.
    #[error("Invalid validation URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Error returned by a [`ProxySource`](crate::ProxySource) when it cannot
/// produce candidates.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to fetch proxy list: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read proxy list: {0}")]
    Io(#[from] std::io::Error),
}
