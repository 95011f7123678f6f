//! Error types for pagehit-core

use thiserror::Error;

/// Main error type for the pagehit-core library
///
/// Only setup work (loading config, building the HTTP client, logging)
/// returns this. Skipped or failed hits are reported through
/// [`SendOutcome`](crate::coordinator::SendOutcome) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for pagehit-core
pub type Result<T> = std::result::Result<T, Error>;
