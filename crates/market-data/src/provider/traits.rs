//! Portfolio data provider trait definitions.
//!
//! This module defines the core `PortfolioProvider` trait that every
//! adapter (crypto exchange, quote API, brokerage aggregator) implements.

use async_trait::async_trait;

use crate::errors::{ProviderError, UpstreamError};
use crate::models::{AssetType, ForexPair, ForexQuote, PriceQuote, RawHolding};

use super::capabilities::{CreditsInfo, ProviderCapabilities, ProviderKind, RetryConfig};
use super::classify::ErrorPatterns;

/// Trait for portfolio data providers.
///
/// Implement this trait to wrap a new upstream source. The registry uses the
/// provider's capabilities and priority to decide which adapter holds or
/// prices each asset type; the retry executor uses `classify_error` and
/// `retry_config` for every outbound call the adapter makes.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use fintech_market_data::provider::{PortfolioProvider, ProviderCapabilities, ProviderKind};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl PortfolioProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::QuoteApi
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             asset_types: &[AssetType::Stock],
///             supports_holdings: false,
///             supports_pricing: true,
///             supports_forex: false,
///         }
///     }
///
///     // ... implement fetch_price
/// }
/// ```
#[async_trait]
pub trait PortfolioProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINBASE", "TWELVE_DATA", etc.
    /// Used for logging and error attribution.
    fn id(&self) -> &'static str;

    /// Which of the fixed adapter variants this is.
    fn kind(&self) -> ProviderKind;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    fn asset_types(&self) -> &'static [AssetType] {
        self.capabilities().asset_types
    }

    fn supports_holdings(&self) -> bool {
        self.capabilities().supports_holdings
    }

    fn supports_pricing(&self) -> bool {
        self.capabilities().supports_pricing
    }

    fn supports_forex(&self) -> bool {
        self.capabilities().supports_forex
    }

    /// Backoff policy for this provider's outbound calls.
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
    }

    /// Map a raw upstream failure to a classified [`ProviderError`].
    fn classify_error(&self, error: &UpstreamError) -> ProviderError {
        ErrorPatterns::DEFAULT.classify(self.id(), error)
    }

    /// Credit usage for metered upstreams; `None` when the provider is not metered.
    fn credits(&self) -> Option<CreditsInfo> {
        None
    }

    /// Fetch all holdings visible to this provider.
    ///
    /// Fails with a generic error when unauthenticated or unreachable.
    /// Zero-quantity holdings are returned as-is.
    async fn fetch_holdings(&self) -> Result<Vec<RawHolding>, ProviderError> {
        Err(ProviderError::unsupported(self.id(), "fetch_holdings"))
    }

    /// Fetch the latest price for a symbol.
    ///
    /// Fails with `INVALID_SYMBOL` when the upstream reports not-found or no
    /// data, `RATE_LIMIT` when throttled past the retry budget.
    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ProviderError> {
        let _ = symbol;
        Err(ProviderError::unsupported(self.id(), "fetch_price"))
    }

    /// Fetch prices for several symbols, one at a time.
    ///
    /// One failing symbol never aborts the batch.
    async fn fetch_prices(
        &self,
        symbols: &[String],
    ) -> Vec<(String, Result<PriceQuote, ProviderError>)> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.fetch_price(symbol).await;
            results.push((symbol.clone(), result));
        }
        results
    }

    /// Fetch the latest rate for a currency pair.
    async fn fetch_forex_rate(&self, pair: &ForexPair) -> Result<ForexQuote, ProviderError> {
        let _ = pair;
        Err(ProviderError::unsupported(self.id(), "fetch_forex_rate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use rust_decimal_macros::dec;

    struct EchoProvider;

    #[async_trait]
    impl PortfolioProvider for EchoProvider {
        fn id(&self) -> &'static str {
            "ECHO"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::QuoteApi
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                asset_types: &[AssetType::Stock],
                supports_holdings: false,
                supports_pricing: true,
                supports_forex: false,
            }
        }

        async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ProviderError> {
            if symbol == "BAD" {
                Err(ProviderError::invalid_symbol(self.id(), symbol))
            } else {
                Ok(PriceQuote::new(dec!(10), dec!(1.5)))
            }
        }
    }

    #[tokio::test]
    async fn test_defaults_report_unsupported() {
        let provider = EchoProvider;
        assert!(!provider.supports_holdings());
        assert!(provider.supports_pricing());
        assert_eq!(provider.asset_types(), &[AssetType::Stock]);

        let err = provider.fetch_holdings().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);

        let pair: ForexPair = "EUR/USD".parse().unwrap();
        assert!(provider.fetch_forex_rate(&pair).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_prices_keeps_going_after_failure() {
        let provider = EchoProvider;
        let symbols = vec!["AAPL".to_string(), "BAD".to_string(), "MSFT".to_string()];
        let results = provider.fetch_prices(&symbols).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.as_ref().unwrap_err().is_invalid_symbol());
        assert_eq!(results[2].0, "MSFT");
        assert!(results[2].1.is_ok());
    }
}
