//! Request authentication boundary.
//!
//! Provider-specific signing schemes (JWT bearer tokens, HMAC signatures)
//! sit behind [`RequestAuthenticator`] so adapters only deal with the
//! headers a signer hands back.

use crate::errors::ProviderError;

/// The parts of an outbound request a signer may cover.
#[derive(Clone, Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Path including any API version prefix, without the query string
    pub path: &'a str,
    /// Encoded query string, without the leading `?`
    pub query: &'a str,
    pub body: Option<&'a serde_json::Value>,
}

/// Produces the authentication headers for one request.
pub trait RequestAuthenticator: Send + Sync {
    fn authorize(
        &self,
        request: &SignableRequest<'_>,
    ) -> Result<Vec<(String, String)>, ProviderError>;
}
