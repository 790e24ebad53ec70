//! Custom error types for rustdblp.
//!
//! This module defines all error types used throughout the crawler.
//! All functions return `Result<T, HarvestError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustdblp operations.
///
/// Fetch failures (`Network`, `Http`) are retried by the fetcher and end up
/// wrapped in `RetriesExhausted` once the retry budget is spent. `Config`
/// errors are raised once at startup and are fatal.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Transport-level HTTP failure (timeout, connection reset, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP error: {status}")]
    Http {
        /// Status code returned by the server
        status: u16,
    },

    /// Fetch failed on every attempt
    #[error("Request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of network attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<HarvestError>,
    },

    /// Expected structure missing from a page
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid URL
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `HarvestError`
pub type Result<T> = std::result::Result<T, HarvestError>;
