//! Twelve Data provider implementation.
//!
//! Prices stocks, ETFs, mutual funds and forex pairs through the `/quote`
//! endpoint. The free plan allows 8 credits per minute, so retries wait a
//! flat 60 seconds.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::errors::{ProviderError, UpstreamError};
use crate::models::{AssetType, ForexPair, ForexQuote, PriceQuote};
use crate::provider::parse::json_decimal;
use crate::provider::{
    CreditsInfo, ErrorPatterns, PortfolioProvider, ProviderCapabilities, ProviderKind,
    RetryConfig,
};
use crate::retry::retry_with_backoff;

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER_ID: &str = "TWELVE_DATA";

const PATTERNS: ErrorPatterns = ErrorPatterns {
    rate_limit: &["429", "Too Many Requests", "rate limit"],
    invalid_symbol: &["404", "not found", "No data"],
    auth: &["401", "Invalid API key"],
    unknown_retryable: false,
};

/// A parsed `/quote` payload.
#[derive(Clone, Debug, PartialEq)]
struct QuoteSnapshot {
    close: Decimal,
    change_24h: Decimal,
    timestamp: Option<DateTime<Utc>>,
}

/// Twelve Data quote API provider.
pub struct TwelveDataProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: Option<u32>,
    credits_used: AtomicU32,
    credits_left: AtomicI64,
}

impl TwelveDataProvider {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_retries: None,
            credits_used: AtomicU32::new(0),
            credits_left: AtomicI64::new(-1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(PROVIDER_ID, "Credentials not loaded"))
    }

    fn record_credits(&self, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        if let Some(used) = header("api-credits-used") {
            self.credits_used
                .store(used.clamp(0, u32::MAX as i64) as u32, Ordering::Relaxed);
        }
        if let Some(left) = header("api-credits-left") {
            self.credits_left.store(left.max(0), Ordering::Relaxed);
        }
    }

    async fn quote(&self, symbol: &str, api_key: &str) -> Result<Option<QuoteSnapshot>, UpstreamError> {
        let url = format!(
            "{}/quote?symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol),
            urlencoding::encode(api_key)
        );

        debug!("Twelve Data quote request: {}", symbol);

        let response = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        self.record_credits(response.headers());

        let status = response.status();
        let text = response.text().await?;

        match parse_quote_body(&text) {
            // A 200 with a body-level error is reported as that error; a non-2xx
            // without one keeps the HTTP status.
            Err(e) if e.status.is_some() => Err(e),
            _ if !status.is_success() => Err(UpstreamError::http(status.as_u16(), text)),
            other => other,
        }
    }

    async fn quote_with_retry(
        &self,
        symbol: &str,
        operation: &str,
    ) -> Result<Option<QuoteSnapshot>, ProviderError> {
        let api_key = self.api_key()?;
        retry_with_backoff(self, operation, move || self.quote(symbol, api_key)).await
    }
}

/// Parse a `/quote` body, surfacing body-level errors.
///
/// Twelve Data reports most failures as HTTP 200 with
/// `{"status": "error", "code": 404, "message": "..."}`.
fn parse_quote_body(text: &str) -> Result<Option<QuoteSnapshot>, UpstreamError> {
    let body: Value = serde_json::from_str(text)
        .map_err(|e| UpstreamError::message(format!("Failed to parse response: {}", e)))?;

    let is_error = body.get("status").and_then(Value::as_str) == Some("error")
        || body.get("code").is_some_and(|c| !c.is_null());
    if is_error {
        let code = body.get("code").and_then(Value::as_u64);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        let code_text = code.map(|c| c.to_string()).unwrap_or_else(|| "error".to_string());
        return Err(UpstreamError {
            status: code.and_then(|c| u16::try_from(c).ok()),
            transport: None,
            message: format!("API error {}: {}", code_text, message),
        });
    }

    let close = match body.get("close").and_then(json_decimal) {
        Some(c) if !c.is_zero() => c,
        _ => return Ok(None),
    };

    let previous_close = body.get("previous_close").and_then(json_decimal);
    let change_24h = match previous_close {
        Some(prev) if !prev.is_zero() => (close - prev) / prev * Decimal::ONE_HUNDRED,
        _ => body
            .get("percent_change")
            .and_then(json_decimal)
            .unwrap_or_default(),
    };

    let timestamp = body
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Ok(Some(QuoteSnapshot {
        close,
        change_24h,
        timestamp,
    }))
}

#[async_trait]
impl PortfolioProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::QuoteApi
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_types: &[
                AssetType::Stock,
                AssetType::Etf,
                AssetType::MutualFund,
                AssetType::Forex,
            ],
            supports_holdings: false,
            supports_pricing: true,
            supports_forex: true,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(3),
            initial_delay: Duration::from_millis(60_000),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(60_000),
        }
    }

    fn classify_error(&self, error: &UpstreamError) -> ProviderError {
        PATTERNS.classify(PROVIDER_ID, error)
    }

    fn credits(&self) -> Option<CreditsInfo> {
        let left = self.credits_left.load(Ordering::Relaxed);
        Some(CreditsInfo {
            used: self.credits_used.load(Ordering::Relaxed),
            left: (left >= 0).then_some(left),
        })
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ProviderError> {
        let operation = format!("Price Fetch ({})", symbol);
        match self.quote_with_retry(symbol, &operation).await? {
            Some(q) => Ok(PriceQuote::new(q.close, q.change_24h)),
            None => Err(ProviderError::invalid_symbol(PROVIDER_ID, symbol)),
        }
    }

    async fn fetch_forex_rate(&self, pair: &ForexPair) -> Result<ForexQuote, ProviderError> {
        let symbol = pair.to_string();
        let operation = format!("Forex Fetch ({})", symbol);
        match self.quote_with_retry(&symbol, &operation).await? {
            Some(q) => Ok(ForexQuote {
                rate: q.close,
                change_24h: q.change_24h,
                timestamp: q.timestamp.unwrap_or_else(Utc::now),
            }),
            None => Err(ProviderError::invalid_symbol(PROVIDER_ID, &symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use reqwest::header::HeaderValue;
    use rust_decimal_macros::dec;

    #[test]
    fn test_capabilities() {
        let provider = TwelveDataProvider::new(Some("key".to_string()));
        assert_eq!(provider.id(), "TWELVE_DATA");
        assert!(!provider.supports_holdings());
        assert!(provider.supports_pricing());
        assert!(provider.supports_forex());
        assert!(provider.capabilities().handles(AssetType::MutualFund));
        assert!(!provider.capabilities().handles(AssetType::Crypto));
    }

    #[test]
    fn test_retry_config_is_flat_minute() {
        let config = TwelveDataProvider::new(None).retry_config();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_quote_with_previous_close() {
        let quote = parse_quote_body(
            r#"{"symbol": "AAPL", "close": "110.00", "previous_close": "100.00", "percent_change": "3.0", "timestamp": 1700000000}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(quote.close, dec!(110));
        assert_eq!(quote.change_24h, dec!(10));
        assert_eq!(quote.timestamp.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_quote_falls_back_to_percent_change() {
        let quote = parse_quote_body(r#"{"close": "50.5", "percent_change": "-2.25"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(quote.close, dec!(50.5));
        assert_eq!(quote.change_24h, dec!(-2.25));
        assert!(quote.timestamp.is_none());
    }

    #[test]
    fn test_parse_quote_without_close_is_no_data() {
        assert!(parse_quote_body(r#"{"symbol": "ZZZZ"}"#).unwrap().is_none());
    }

    #[test]
    fn test_body_level_error_becomes_classified_failure() {
        let provider = TwelveDataProvider::new(None);

        let err = parse_quote_body(
            r#"{"code": 404, "message": "**symbol** not found: ZZZZ", "status": "error"}"#,
        )
        .unwrap_err();
        assert_eq!(err.status, Some(404));
        assert!(err.message.starts_with("API error 404:"));
        assert_eq!(provider.classify_error(&err).code, ErrorCode::InvalidSymbol);

        let err = parse_quote_body(
            r#"{"code": 429, "message": "You have run out of API credits", "status": "error"}"#,
        )
        .unwrap_err();
        let classified = provider.classify_error(&err);
        assert_eq!((classified.code, classified.retryable), (ErrorCode::RateLimit, true));

        let err = parse_quote_body(r#"{"code": 401, "message": "Invalid API key", "status": "error"}"#)
            .unwrap_err();
        assert_eq!(provider.classify_error(&err).code, ErrorCode::AuthError);
    }

    #[test]
    fn test_unknown_failures_are_not_retried() {
        let provider = TwelveDataProvider::new(None);
        let e = provider.classify_error(&UpstreamError::message("something odd"));
        assert_eq!((e.code, e.retryable), (ErrorCode::Unknown, false));
    }

    #[test]
    fn test_credits_tracked_from_headers() {
        let provider = TwelveDataProvider::new(None);
        assert_eq!(provider.credits(), Some(CreditsInfo { used: 0, left: None }));

        let mut headers = HeaderMap::new();
        headers.insert("api-credits-used", HeaderValue::from_static("3"));
        headers.insert("api-credits-left", HeaderValue::from_static("5"));
        provider.record_credits(&headers);

        assert_eq!(provider.credits(), Some(CreditsInfo { used: 3, left: Some(5) }));
    }

    async fn quote_server(body: &str) -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("api-credits-used", "2")
            .with_header("api-credits-left", "6")
            .with_body(body)
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_invalid_symbol_keeps_upstream_message() {
        let server =
            quote_server(r#"{"code": 404, "message": "**symbol** not found: ZZZZ", "status": "error"}"#)
                .await;
        let provider = TwelveDataProvider::new(Some("key".to_string())).with_base_url(server.url());

        let err = provider.fetch_price("ZZZZ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSymbol);
        assert!(err.message.contains("not found: ZZZZ"), "{}", err.message);
        assert_eq!(provider.credits(), Some(CreditsInfo { used: 2, left: Some(6) }));
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_upstream_message() {
        let server = quote_server(
            r#"{"code": 429, "message": "You have run out of API credits for the current minute", "status": "error"}"#,
        )
        .await;
        let provider = TwelveDataProvider::new(Some("key".to_string()))
            .with_base_url(server.url())
            .with_max_retries(Some(0));

        let err = provider
            .fetch_forex_rate(&"EUR/USD".parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimit);
        assert!(err.message.contains("run out of API credits"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let provider = TwelveDataProvider::new(None);
        let err = provider.fetch_price("AAPL").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);
        assert!(err.message.contains("Credentials not loaded"));
    }
}
