//! Coinbase API-key request signing.
//!
//! Each request carries `CB-ACCESS-KEY`, `CB-ACCESS-TIMESTAMP` and
//! `CB-ACCESS-SIGN`, the hex HMAC-SHA256 of `timestamp + METHOD + path + body`
//! keyed by the API secret. The query string is not signed.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::ProviderError;
use crate::provider::{RequestAuthenticator, SignableRequest};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinbaseCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl CoinbaseCredentials {
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

pub struct CoinbaseKeySigner {
    credentials: CoinbaseCredentials,
}

impl CoinbaseKeySigner {
    pub fn new(credentials: CoinbaseCredentials) -> Self {
        Self { credentials }
    }

    pub fn sign(&self, timestamp: i64, request: &SignableRequest<'_>) -> Result<String, ProviderError> {
        let body = request.body.map(|b| b.to_string()).unwrap_or_default();
        let message = format!(
            "{}{}{}{}",
            timestamp,
            request.method.to_uppercase(),
            request.path,
            body
        );

        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| {
                ProviderError::not_configured(super::PROVIDER_ID, format!("Invalid API secret: {}", e))
            })?;
        mac.update(message.as_bytes());
        Ok(mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }
}

impl RequestAuthenticator for CoinbaseKeySigner {
    fn authorize(&self, request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, ProviderError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.sign(timestamp, request)?;
        Ok(vec![
            ("CB-ACCESS-KEY".to_string(), self.credentials.api_key.clone()),
            ("CB-ACCESS-SIGN".to_string(), signature),
            ("CB-ACCESS-TIMESTAMP".to_string(), timestamp.to_string()),
        ])
    }
}
