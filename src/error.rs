//! factbot error types

use thiserror::Error;

/// factbot error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generative API error (recovered by fallback content)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Messaging API error (aborts the rest of the current run)
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Dedup ledger error (aborts the rest of the current run)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for factbot operations
pub type Result<T> = std::result::Result<T, Error>;
