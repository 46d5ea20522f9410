use std::fmt;

/// Transport-level failure kinds, mapped from the HTTP client's error flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportFailure {
    Timeout,
    ConnectionReset,
    DnsFailure,
    Other,
}

/// Raw failure of a single outbound request, before classification.
///
/// Adapters build one of these from an HTTP status (plus body), a body-level
/// error object, or a transport error; `classify_error` then pattern-matches
/// on the status and message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub transport: Option<TransportFailure>,
    pub message: String,
}

impl UpstreamError {
    pub fn http(status: u16, body: impl AsRef<str>) -> Self {
        Self {
            status: Some(status),
            transport: None,
            message: format!(
                "API request failed with status {}: {}",
                status,
                body.as_ref()
            ),
        }
    }

    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            status: None,
            transport: Some(kind),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            transport: None,
            message: message.into(),
        }
    }

    pub fn is_server_status(&self) -> bool {
        matches!(self.status, Some(s) if (500..600).contains(&s))
    }

    /// Case-insensitive substring check against the upstream message.
    pub fn mentions(&self, needle: &str) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportFailure::Timeout
        } else if e.is_connect() {
            let text = e.to_string().to_ascii_lowercase();
            if text.contains("dns") || text.contains("resolve") {
                TransportFailure::DnsFailure
            } else {
                TransportFailure::ConnectionReset
            }
        } else if e.is_request() || e.is_body() {
            TransportFailure::ConnectionReset
        } else {
            TransportFailure::Other
        };

        match e.status() {
            Some(status) => Self {
                status: Some(status.as_u16()),
                transport: None,
                message: format!("Request failed: {}", e),
            },
            None => Self::transport(kind, format!("Request failed: {}", e)),
        }
    }
}
