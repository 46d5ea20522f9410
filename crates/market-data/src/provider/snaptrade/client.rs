//! Minimal SnapTrade REST client.
//!
//! Every request carries `clientId` and `timestamp` query parameters and a
//! `Signature` header: base64 HMAC-SHA256, keyed by the consumer key, over the
//! key-sorted JSON `{"content": <body or {}>, "path": "/api/v1/...", "query": "<query>"}`.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::errors::{ProviderError, UpstreamError};
use crate::provider::{RequestAuthenticator, SignableRequest};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://api.snaptrade.com";
pub const API_VERSION_PATH: &str = "/api/v1";

/// Credentials for one SnapTrade user connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapTradeCredentials {
    pub client_id: String,
    pub consumer_key: String,
    pub user_id: String,
    pub user_secret: String,
}

impl SnapTradeCredentials {
    /// All four fields must be present and non-empty.
    pub fn is_complete(&self) -> bool {
        [
            &self.client_id,
            &self.consumer_key,
            &self.user_id,
            &self.user_secret,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// A brokerage account visible to the connected user.
#[derive(Clone, Debug, Deserialize)]
pub struct SnapTradeAccount {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Serialise JSON with object keys sorted at every level.
pub fn stable_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), stable_json(&map[k])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", fields)
        }
        Value::Array(items) => {
            let items = items.iter().map(stable_json).collect::<Vec<_>>().join(",");
            format!("[{}]", items)
        }
        other => other.to_string(),
    }
}

/// Build a query string with keys sorted and empty values dropped.
pub fn build_query(params: &[(&str, &str)]) -> String {
    let mut entries: Vec<(&str, &str)> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .copied()
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    entries
        .into_iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 request signer keyed by the consumer key.
pub struct SnapTradeSigner {
    consumer_key: String,
}

impl SnapTradeSigner {
    pub fn new(consumer_key: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
        }
    }

    pub fn sign(&self, path: &str, query: &str, content: Option<&Value>) -> Result<String, ProviderError> {
        let empty = Value::Object(serde_json::Map::new());
        let payload = serde_json::json!({
            "content": content.unwrap_or(&empty),
            "path": path,
            "query": query,
        });

        let mut mac = HmacSha256::new_from_slice(self.consumer_key.as_bytes()).map_err(|e| {
            ProviderError::not_configured(super::PROVIDER_ID, format!("Invalid consumer key: {}", e))
        })?;
        mac.update(stable_json(&payload).as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl RequestAuthenticator for SnapTradeSigner {
    fn authorize(&self, request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, ProviderError> {
        let signature = self.sign(request.path, request.query, request.body)?;
        Ok(vec![("Signature".to_string(), signature)])
    }
}

pub struct SnapTradeClient {
    http: Client,
    base_url: String,
    credentials: SnapTradeCredentials,
    signer: SnapTradeSigner,
}

impl SnapTradeClient {
    pub fn new(credentials: SnapTradeCredentials) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            signer: SnapTradeSigner::new(credentials.consumer_key.clone()),
            credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Signed GET against `/api/v1{path}` with the user's credentials.
    async fn get(&self, path: &str) -> Result<Value, UpstreamError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let query = build_query(&[
            ("userId", self.credentials.user_id.as_str()),
            ("userSecret", self.credentials.user_secret.as_str()),
            ("clientId", self.credentials.client_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);
        let request_path = format!("{}{}", API_VERSION_PATH, path);

        let host = self
            .base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let headers = self
            .signer
            .authorize(&SignableRequest {
                method: "GET",
                host,
                path: &request_path,
                query: &query,
                body: None,
            })
            .map_err(|e| UpstreamError::http(401, format!("request signing failed: {}", e.message)))?;

        let url = format!("{}{}?{}", self.base_url, request_path, query);
        debug!("SnapTrade request: {}", request_path);

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let json: Option<Value> = if text.is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        if !status.is_success() {
            let detail = json
                .as_ref()
                .and_then(|j| {
                    ["detail", "message", "error"]
                        .iter()
                        .find_map(|k| j.get(*k).and_then(Value::as_str))
                })
                .map(str::to_string)
                .unwrap_or(text);
            return Err(UpstreamError::http(status.as_u16(), detail));
        }

        json.ok_or_else(|| UpstreamError::message("Failed to parse response: empty or invalid JSON"))
    }

    pub async fn list_accounts(&self) -> Result<Vec<SnapTradeAccount>, UpstreamError> {
        let body = self.get("/accounts").await?;
        serde_json::from_value(body)
            .map_err(|e| UpstreamError::message(format!("Failed to parse accounts: {}", e)))
    }

    /// Raw positions for one account, whichever envelope the API used.
    pub async fn list_positions(&self, account_id: &str) -> Result<Vec<Value>, UpstreamError> {
        let path = format!("/accounts/{}/positions", urlencoding::encode(account_id));
        let body = self.get(&path).await?;
        Ok(extract_positions(body))
    }
}

/// Accepts a bare array, `{"positions": [...]}` or `{"data": [...]}`.
pub fn extract_positions(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ["positions", "data"]
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
