//! Coinbase Advanced Trade provider implementation.
//!
//! This module provides crypto data from the Coinbase v3 brokerage API:
//! - Holdings via /api/v3/brokerage/accounts (authenticated)
//! - Spot prices via /api/v3/brokerage/market/products/{SYMBOL}-USD (public)
//!
//! Authentication is delegated to a [`RequestAuthenticator`]; without one the
//! provider still prices crypto but cannot return holdings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{ErrorCode, ProviderError, UpstreamError};
use crate::models::{AssetType, PriceQuote, RawHolding};
use crate::provider::parse::parse_decimal;
use crate::provider::{
    ErrorPatterns, PortfolioProvider, ProviderCapabilities, ProviderKind, RequestAuthenticator,
    RetryConfig, SignableRequest,
};
use crate::retry::retry_with_backoff;

mod auth;

pub use auth::{CoinbaseCredentials, CoinbaseKeySigner};

const BASE_URL: &str = "https://api.coinbase.com";
const HOST: &str = "api.coinbase.com";
const PROVIDER_ID: &str = "COINBASE";
const ACCOUNTS_PATH: &str = "/api/v3/brokerage/accounts";
const PRODUCTS_PATH: &str = "/api/v3/brokerage/market/products";
const ACCOUNTS_PAGE_LIMIT: &str = "250";
const MAX_ACCOUNT_PAGES: usize = 20;

/// Source tag attached to every holding this provider returns.
pub const HOLDINGS_SOURCE: &str = "coinbase-api";

const PATTERNS: ErrorPatterns = ErrorPatterns {
    rate_limit: &["429", "rate limit", "rate_limit_exceeded"],
    invalid_symbol: &["404", "not found", "INVALID_SYMBOL"],
    auth: &["401", "403", "unauthorized"],
    unknown_retryable: true,
};

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    has_next: bool,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    currency: String,
    available_balance: Balance,
}

#[derive(Debug, Deserialize)]
struct Balance {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    price_percentage_change_24h: Option<String>,
}

// ============================================================================
// CoinbaseProvider
// ============================================================================

/// Coinbase crypto exchange provider.
///
/// Short exponential backoff (2s doubling to 64s) suits the exchange's
/// per-second throttling.
pub struct CoinbaseProvider {
    client: Client,
    base_url: String,
    authenticator: Option<Arc<dyn RequestAuthenticator>>,
    max_retries: Option<u32>,
}

impl CoinbaseProvider {
    pub fn new(authenticator: Option<Arc<dyn RequestAuthenticator>>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            authenticator,
            max_retries: None,
        }
    }

    /// Override the retry budget (configuration `maxRetries`).
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticator.is_some()
    }

    /// Make a GET request to the Coinbase API.
    async fn get(
        &self,
        path: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<String, UpstreamError> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let mut request = self
            .client
            .get(&url)
            .header("Content-Type", "application/json");

        if authenticated {
            let authenticator = self.authenticator.as_ref().ok_or_else(|| {
                UpstreamError::http(401, "unauthorized: no Coinbase credentials loaded")
            })?;
            let signable = SignableRequest {
                method: "GET",
                host: HOST,
                path,
                query: &query,
                body: None,
            };
            let headers = authenticator.authorize(&signable).map_err(|e| {
                UpstreamError::http(401, format!("request signing failed: {}", e.message))
            })?;
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        debug!("Coinbase request: {}", path);

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(UpstreamError::http(status.as_u16(), body));
        }

        Ok(body)
    }
}

/// Convert one accounts page into holdings, keeping zero balances.
fn holdings_from_accounts(accounts: Vec<Account>) -> Vec<RawHolding> {
    let mut holdings = Vec::with_capacity(accounts.len());
    for account in accounts {
        if account.currency.is_empty() {
            continue;
        }
        match parse_decimal(&account.available_balance.value) {
            Some(quantity) => holdings.push(RawHolding::new(
                account.currency,
                AssetType::Crypto,
                quantity,
                HOLDINGS_SOURCE,
            )),
            None => warn!(
                "Skipping Coinbase account {} with unparseable balance '{}'",
                account.currency, account.available_balance.value
            ),
        }
    }
    holdings
}

/// Read price and 24h change from a product payload.
fn parse_product(body: &str) -> Result<Option<PriceQuote>, UpstreamError> {
    let product: ProductResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::message(format!("Failed to parse response: {}", e)))?;

    let price = match product.price.as_deref().and_then(parse_decimal) {
        Some(p) if !p.is_zero() => p,
        _ => return Ok(None),
    };
    let change_24h = product
        .price_percentage_change_24h
        .as_deref()
        .and_then(parse_decimal)
        .unwrap_or_default();

    Ok(Some(PriceQuote::new(price, change_24h)))
}

#[async_trait]
impl PortfolioProvider for CoinbaseProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::CryptoExchange
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_types: &[AssetType::Crypto],
            supports_holdings: true,
            supports_pricing: true,
            supports_forex: false,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(6),
            initial_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(64_000),
        }
    }

    fn classify_error(&self, error: &UpstreamError) -> ProviderError {
        PATTERNS.classify(PROVIDER_ID, error)
    }

    async fn fetch_holdings(&self) -> Result<Vec<RawHolding>, ProviderError> {
        if !self.is_authenticated() {
            return Err(ProviderError::not_configured(
                PROVIDER_ID,
                "Credentials not loaded",
            ));
        }

        let mut holdings = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_ACCOUNT_PAGES {
            let body = retry_with_backoff(self, "Holdings Fetch", || {
                let cursor = cursor.clone();
                async move {
                    let mut params = vec![("limit", ACCOUNTS_PAGE_LIMIT)];
                    if let Some(c) = cursor.as_deref() {
                        params.push(("cursor", c));
                    }
                    self.get(ACCOUNTS_PATH, &params, true).await
                }
            })
            .await?;

            let page: AccountsResponse = serde_json::from_str(&body).map_err(|e| {
                ProviderError::new(
                    PROVIDER_ID,
                    ErrorCode::Unknown,
                    false,
                    format!("Failed to parse accounts response: {}", e),
                )
            })?;

            holdings.extend(holdings_from_accounts(page.accounts));

            match page.cursor.filter(|c| page.has_next && !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!("Coinbase returned {} holdings", holdings.len());
        Ok(holdings)
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ProviderError> {
        let product_path = format!("{}/{}-USD", PRODUCTS_PATH, symbol);
        let operation = format!("Price Fetch ({})", symbol);

        let path = product_path.as_str();
        let result = retry_with_backoff(self, &operation, || async move {
            let body = self.get(path, &[], false).await?;
            parse_product(&body)
        })
        .await;

        match result {
            Ok(Some(quote)) => Ok(quote),
            Ok(None) => Err(ProviderError::invalid_symbol(PROVIDER_ID, symbol)),
            Err(e) if e.is_invalid_symbol() => {
                Err(ProviderError::invalid_symbol(PROVIDER_ID, symbol))
            }
            Err(e) if e.is_rate_limited() => Err(ProviderError::rate_limited(PROVIDER_ID, symbol)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_capabilities() {
        let provider = CoinbaseProvider::new(None);
        assert_eq!(provider.id(), "COINBASE");
        assert_eq!(provider.kind(), ProviderKind::CryptoExchange);
        assert!(provider.supports_holdings());
        assert!(provider.supports_pricing());
        assert!(!provider.supports_forex());
        assert_eq!(provider.asset_types(), &[AssetType::Crypto]);
    }

    #[test]
    fn test_retry_config_honours_override() {
        let provider = CoinbaseProvider::new(None);
        let config = provider.retry_config();
        assert_eq!(config.max_retries, 6);
        assert_eq!(config.initial_delay, Duration::from_millis(2000));
        assert_eq!(config.max_delay, Duration::from_millis(64_000));

        let provider = CoinbaseProvider::new(None).with_max_retries(Some(2));
        assert_eq!(provider.retry_config().max_retries, 2);
    }

    #[test]
    fn test_classify_error() {
        let provider = CoinbaseProvider::new(None);

        let e = provider.classify_error(&UpstreamError::message("rate_limit_exceeded"));
        assert_eq!((e.code, e.retryable), (ErrorCode::RateLimit, true));

        let e = provider.classify_error(&UpstreamError::http(404, "product not found"));
        assert_eq!((e.code, e.retryable), (ErrorCode::InvalidSymbol, false));

        let e = provider.classify_error(&UpstreamError::http(401, ""));
        assert_eq!((e.code, e.retryable), (ErrorCode::AuthError, false));

        // Coinbase treats unrecognised failures as transient
        let e = provider.classify_error(&UpstreamError::message("weird"));
        assert_eq!((e.code, e.retryable), (ErrorCode::Unknown, true));
    }

    #[test]
    fn test_holdings_keep_zero_balances() {
        let body = r#"{
            "accounts": [
                {"currency": "BTC", "available_balance": {"value": "0.50000000", "currency": "BTC"}},
                {"currency": "DOGE", "available_balance": {"value": "0", "currency": "DOGE"}},
                {"currency": "", "available_balance": {"value": "1", "currency": ""}},
                {"currency": "ETH", "available_balance": {"value": "bogus", "currency": "ETH"}}
            ],
            "has_next": false,
            "cursor": ""
        }"#;
        let page: AccountsResponse = serde_json::from_str(body).unwrap();
        let holdings = holdings_from_accounts(page.accounts);

        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "BTC");
        assert_eq!(holdings[0].quantity, dec!(0.5));
        assert_eq!(holdings[0].source, HOLDINGS_SOURCE);
        assert_eq!(holdings[1].symbol, "DOGE");
        assert!(holdings[1].quantity.is_zero());
    }

    #[test]
    fn test_parse_product() {
        let quote = parse_product(
            r#"{"product_id": "BTC-USD", "price": "43000.12", "price_percentage_change_24h": "-1.25"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(quote.price, dec!(43000.12));
        assert_eq!(quote.change_24h, dec!(-1.25));

        let missing = parse_product(r#"{"product_id": "XYZ-USD", "price": ""}"#).unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_holdings_require_credentials() {
        let provider = CoinbaseProvider::new(None);
        let err = provider.fetch_holdings().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);
        assert!(err.message.contains("Credentials"));
    }
}
