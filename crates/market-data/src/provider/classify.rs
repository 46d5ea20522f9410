//! Shared status/message pattern matching behind every adapter's `classify_error`.

use crate::errors::{ErrorCode, ProviderError, UpstreamError};

/// Substring tables one adapter recognises, plus its policy for unknown failures.
///
/// Status codes are always checked first (429, 404, 401/403, 5xx); message
/// substrings cover upstreams that report failures inside a 200 body.
#[derive(Clone, Copy, Debug)]
pub struct ErrorPatterns {
    pub rate_limit: &'static [&'static str],
    pub invalid_symbol: &'static [&'static str],
    pub auth: &'static [&'static str],
    pub unknown_retryable: bool,
}

const SERVER_STATUS_TEXT: &[&str] = &["500", "502", "503", "504"];
const NETWORK_TEXT: &[&str] = &[
    "ECONNRESET",
    "ETIMEDOUT",
    "ENOTFOUND",
    "connection reset",
    "timed out",
];

impl ErrorPatterns {
    pub const DEFAULT: ErrorPatterns = ErrorPatterns {
        rate_limit: &["429", "rate limit"],
        invalid_symbol: &["404", "not found"],
        auth: &["401", "403", "unauthorized"],
        unknown_retryable: false,
    };

    pub fn classify(&self, provider: &str, error: &UpstreamError) -> ProviderError {
        let (code, retryable) = self.code_for(error);
        ProviderError::new(provider, code, retryable, error.message.clone())
    }

    fn code_for(&self, error: &UpstreamError) -> (ErrorCode, bool) {
        match error.status {
            Some(429) => return (ErrorCode::RateLimit, true),
            Some(404) => return (ErrorCode::InvalidSymbol, false),
            Some(401) | Some(403) => return (ErrorCode::AuthError, false),
            _ if error.is_server_status() => return (ErrorCode::ServerError, true),
            _ => {}
        }

        if error.transport.is_some() {
            return (ErrorCode::NetworkError, true);
        }

        let any = |needles: &[&str]| needles.iter().any(|n| error.mentions(n));

        if any(self.rate_limit) {
            (ErrorCode::RateLimit, true)
        } else if any(self.invalid_symbol) {
            (ErrorCode::InvalidSymbol, false)
        } else if any(self.auth) {
            (ErrorCode::AuthError, false)
        } else if any(SERVER_STATUS_TEXT) {
            (ErrorCode::ServerError, true)
        } else if any(NETWORK_TEXT) {
            (ErrorCode::NetworkError, true)
        } else {
            (ErrorCode::Unknown, self.unknown_retryable)
        }
    }
}
