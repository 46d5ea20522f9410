//! Error types and classification for the market data crate.
//!
//! This module provides:
//! - [`ProviderError`]: A classified failure surfaced by every adapter call
//! - [`ErrorCode`]: The taxonomy each adapter's classifier maps raw failures into
//! - [`UpstreamError`]: The raw, unclassified failure an outbound request produced

mod upstream;

pub use upstream::{TransportFailure, UpstreamError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification codes assigned by an adapter's `classify_error`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The upstream reported not-found / no-data for the symbol.
    InvalidSymbol,
    /// The upstream throttled the request (HTTP 429 or equivalent).
    RateLimit,
    /// Credentials were rejected (HTTP 401/403).
    AuthError,
    /// The upstream failed internally (HTTP 5xx).
    ServerError,
    /// The request never completed (reset, timeout, DNS).
    NetworkError,
    /// Anything the classifier could not recognise.
    Unknown,
}

impl ErrorCode {
    /// Codes the retry executor refuses to retry, whatever the classifier says.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidSymbol | Self::AuthError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSymbol => "INVALID_SYMBOL",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified provider failure.
///
/// Produced by [`PortfolioProvider::classify_error`](crate::provider::PortfolioProvider::classify_error)
/// and propagated unchanged by the retry executor once the retry budget is spent,
/// so callers can branch on [`code`](Self::code).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {provider}: {message}")]
pub struct ProviderError {
    /// The provider that produced the failure
    pub provider: String,
    /// Classified failure code
    pub code: ErrorCode,
    /// Whether the classifier considers the failure transient
    pub retryable: bool,
    /// Original upstream message
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        code: ErrorCode,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            code,
            retryable,
            message: message.into(),
        }
    }

    pub fn invalid_symbol(provider: impl Into<String>, symbol: &str) -> Self {
        Self::new(
            provider,
            ErrorCode::InvalidSymbol,
            false,
            format!("Invalid or unavailable symbol: {}", symbol),
        )
    }

    pub fn rate_limited(provider: impl Into<String>, symbol: &str) -> Self {
        Self::new(
            provider,
            ErrorCode::RateLimit,
            true,
            format!("Rate limit exceeded for {}", symbol),
        )
    }

    /// Generic failure for an operation the adapter does not implement.
    pub fn unsupported(provider: impl Into<String>, operation: &str) -> Self {
        let provider = provider.into();
        let message = format!("{}() not implemented by {}", operation, provider);
        Self::new(provider, ErrorCode::Unknown, false, message)
    }

    /// Generic failure raised before any request is made (missing credentials, etc).
    pub fn not_configured(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ErrorCode::Unknown, false, message)
    }

    pub fn is_invalid_symbol(&self) -> bool {
        self.code == ErrorCode::InvalidSymbol
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == ErrorCode::RateLimit
    }
}
