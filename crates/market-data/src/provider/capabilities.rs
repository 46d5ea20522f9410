//! Provider capabilities and retry configuration.
//!
//! This module defines structures for describing what a portfolio data provider
//! can do and how its failed calls should be retried.

use std::time::Duration;

use serde::Serialize;

use crate::models::AssetType;

/// The fixed set of adapter variants.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProviderKind {
    /// Crypto exchange exposing balances and spot prices.
    CryptoExchange,
    /// Quote API for stocks, funds and currency pairs.
    QuoteApi,
    /// Brokerage aggregator exposing positions with cost basis.
    BrokerageAggregator,
}

/// Describes the capabilities of a provider.
///
/// Used by the registry to determine which providers can hold or price
/// specific asset types.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Asset types this provider can hold or price.
    pub asset_types: &'static [AssetType],

    /// Whether the provider returns account holdings.
    pub supports_holdings: bool,

    /// Whether the provider returns symbol prices.
    pub supports_pricing: bool,

    /// Whether the provider returns currency pair rates.
    pub supports_forex: bool,
}

impl ProviderCapabilities {
    pub fn handles(&self, asset_type: AssetType) -> bool {
        self.asset_types.contains(&asset_type)
    }
}

/// API credit usage reported by a metered upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsInfo {
    pub used: u32,
    /// `None` until the upstream has reported it
    pub left: Option<i64>,
}

/// Backoff policy applied by [`retry_with_backoff`](crate::retry::retry_with_backoff).
///
/// Delays grow as `initial_delay * backoff_multiplier^(attempt-1)`, capped at
/// `max_delay`. No jitter is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(60_000),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let initial_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (initial_ms * self.backoff_multiplier.powi(exponent)).min(max_ms);

        if delay_ms.is_finite() && delay_ms >= 0.0 {
            Duration::from_millis(delay_ms as u64)
        } else {
            self.max_delay
        }
    }
}
