//! Core error types for the fintech sync engine.

use fintech_market_data::ProviderError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the sync engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("No provider can {0}")]
    NoProvider(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
