//! SnapTrade brokerage-aggregator provider.
//!
//! Pulls positions (with cost basis) from every brokerage account linked to
//! a SnapTrade user. SnapTrade syncs with the brokerage asynchronously, so a
//! holdings fetch can stall for minutes; the whole fetch runs inside the
//! coarse timeout/retry layer on top of the per-request backoff.

mod client;

pub use client::{
    build_query, extract_positions, stable_json, SnapTradeAccount, SnapTradeClient,
    SnapTradeCredentials, SnapTradeSigner, API_VERSION_PATH, DEFAULT_BASE_URL,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ProviderError;
use crate::models::{AssetType, RawHolding};
use crate::provider::parse::json_decimal;
use crate::provider::{PortfolioProvider, ProviderCapabilities, ProviderKind, RetryConfig};
use crate::retry::{retry_with_backoff, with_timeout_retry, CoarseRetryPolicy};

pub(crate) const PROVIDER_ID: &str = "SNAPTRADE";

/// Source tag attached to every holding this provider returns.
pub const HOLDINGS_SOURCE: &str = "snaptrade";

pub struct SnapTradeProvider {
    client: SnapTradeClient,
    max_retries: Option<u32>,
    coarse_policy: CoarseRetryPolicy,
}

impl SnapTradeProvider {
    pub fn new(credentials: SnapTradeCredentials) -> Self {
        Self {
            client: SnapTradeClient::new(credentials),
            max_retries: None,
            coarse_policy: CoarseRetryPolicy::default(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    /// One pass over all accounts; each request has its own backoff.
    async fn fetch_holdings_once(&self) -> Result<Vec<RawHolding>, ProviderError> {
        let accounts =
            retry_with_backoff(self, "List Accounts", move || self.client.list_accounts()).await?;

        let mut holdings = Vec::new();
        for account in &accounts {
            let Some(account_id) = account.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            let operation = format!("List Positions ({})", account_id);
            let positions = retry_with_backoff(self, &operation, move || {
                self.client.list_positions(account_id)
            })
            .await?;

            debug!(
                "SnapTrade account {} returned {} positions",
                account.name.as_deref().unwrap_or(account_id),
                positions.len()
            );
            holdings.extend(normalize_positions(&positions));
        }

        Ok(holdings)
    }
}

/// Map SnapTrade security type codes onto asset types.
fn asset_type_for_code(code: Option<&str>) -> AssetType {
    match code.map(|c| c.to_ascii_lowercase()).as_deref() {
        Some("et") | Some("etf") => AssetType::Etf,
        Some("oef") | Some("cef") | Some("mf") => AssetType::MutualFund,
        Some("crypto") => AssetType::Crypto,
        _ => AssetType::Stock,
    }
}

/// Locate the ticker and type code in the nested `symbol` object.
///
/// Seen shapes: `symbol.symbol.symbol`, `symbol.symbol` as a string,
/// `symbol.ticker`, and `symbol` as a bare string.
fn symbol_and_type(position: &Value) -> Option<(String, Option<String>)> {
    let symbol = position.get("symbol")?;
    if let Some(s) = symbol.as_str() {
        return Some((s.to_string(), None));
    }

    let inner = symbol.get("symbol");
    let ticker = inner
        .and_then(|i| i.get("symbol"))
        .and_then(Value::as_str)
        .or_else(|| inner.and_then(Value::as_str))
        .or_else(|| symbol.get("ticker").and_then(Value::as_str))?;

    let type_code = [inner, Some(symbol)]
        .into_iter()
        .flatten()
        .find_map(|s| s.get("type").and_then(|t| t.get("code")).and_then(Value::as_str))
        .map(str::to_string);

    Some((ticker.to_string(), type_code))
}

/// Convert raw positions into holdings.
///
/// Quantity is read from `units`, then `quantity`, then `total_quantity`.
/// Cost basis is `average_purchase_price × units`. Zero-unit positions are
/// kept.
pub fn normalize_positions(positions: &[Value]) -> Vec<RawHolding> {
    let mut holdings = Vec::with_capacity(positions.len());

    for position in positions {
        let Some((symbol, type_code)) = symbol_and_type(position) else {
            warn!("Skipping SnapTrade position without a symbol");
            continue;
        };
        if symbol.trim().is_empty() {
            continue;
        }

        let units = ["units", "quantity", "total_quantity"]
            .iter()
            .filter_map(|k| position.get(*k))
            .find(|v| !v.is_null())
            .and_then(json_decimal);
        let Some(units) = units else {
            warn!("Skipping SnapTrade position {} without units", symbol);
            continue;
        };

        let mut holding = RawHolding::new(
            symbol,
            asset_type_for_code(type_code.as_deref()),
            units,
            HOLDINGS_SOURCE,
        );

        if let Some(avg) = position.get("average_purchase_price").and_then(json_decimal) {
            holding = holding
                .with_avg_purchase_price(avg)
                .with_cost_basis(avg * units);
        }
        if let Some(pnl) = position.get("open_pnl").and_then(json_decimal) {
            holding = holding.with_open_pnl(pnl);
        }

        holdings.push(holding);
    }

    holdings
}

#[async_trait]
impl PortfolioProvider for SnapTradeProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::BrokerageAggregator
    }

    fn priority(&self) -> u8 {
        5
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_types: &[
                AssetType::Stock,
                AssetType::Etf,
                AssetType::MutualFund,
                AssetType::Crypto,
            ],
            supports_holdings: true,
            supports_pricing: false,
            supports_forex: false,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(3),
            ..RetryConfig::default()
        }
    }

    async fn fetch_holdings(&self) -> Result<Vec<RawHolding>, ProviderError> {
        with_timeout_retry(PROVIDER_ID, &self.coarse_policy, "Holdings Fetch", move || {
            self.fetch_holdings_once()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn provider() -> SnapTradeProvider {
        SnapTradeProvider::new(SnapTradeCredentials {
            client_id: "c".to_string(),
            consumer_key: "k".to_string(),
            user_id: "u".to_string(),
            user_secret: "s".to_string(),
        })
    }

    #[test]
    fn test_capabilities() {
        let provider = provider();
        assert_eq!(provider.id(), "SNAPTRADE");
        assert_eq!(provider.kind(), ProviderKind::BrokerageAggregator);
        assert!(provider.supports_holdings());
        assert!(!provider.supports_pricing());
        assert_eq!(provider.retry_config(), RetryConfig::default());
        assert_eq!(
            provider.with_max_retries(Some(1)).retry_config().max_retries,
            1
        );
    }

    #[test]
    fn test_normalize_nested_symbol_with_cost_basis() {
        let positions = vec![json!({
            "symbol": {
                "symbol": {"symbol": "VTI", "type": {"code": "et"}},
                "id": "abc"
            },
            "units": 10,
            "price": 250.0,
            "open_pnl": 120.5,
            "average_purchase_price": 238.0
        })];

        let holdings = normalize_positions(&positions);
        assert_eq!(holdings.len(), 1);
        let h = &holdings[0];
        assert_eq!(h.symbol, "VTI");
        assert_eq!(h.asset_type, AssetType::Etf);
        assert_eq!(h.quantity, dec!(10));
        assert_eq!(h.avg_purchase_price, Some(dec!(238)));
        assert_eq!(h.cost_basis, Some(dec!(2380)));
        assert_eq!(h.open_pnl, Some(dec!(120.5)));
        assert_eq!(h.source, "snaptrade");
    }

    #[test]
    fn test_normalize_alternate_shapes() {
        let positions = vec![
            json!({"symbol": "AAPL", "quantity": "3"}),
            json!({"symbol": {"ticker": "FXAIX", "type": {"code": "oef"}}, "total_quantity": 1.5}),
            json!({"symbol": {"symbol": "MSFT"}, "units": null, "quantity": 2}),
            json!({"symbol": {"symbol": "ZERO"}, "units": 0}),
            json!({"units": 4}),
            json!({"symbol": "NOUNITS"}),
        ];

        let holdings = normalize_positions(&positions);
        let summary: Vec<(&str, AssetType, Decimal)> = holdings
            .iter()
            .map(|h| (h.symbol.as_str(), h.asset_type, h.quantity))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("AAPL", AssetType::Stock, dec!(3)),
                ("FXAIX", AssetType::MutualFund, dec!(1.5)),
                ("MSFT", AssetType::Stock, dec!(2)),
                ("ZERO", AssetType::Stock, dec!(0)),
            ]
        );
        assert!(holdings.iter().all(|h| h.cost_basis.is_none()));
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(asset_type_for_code(Some("cs")), AssetType::Stock);
        assert_eq!(asset_type_for_code(Some("ETF")), AssetType::Etf);
        assert_eq!(asset_type_for_code(Some("cef")), AssetType::MutualFund);
        assert_eq!(asset_type_for_code(Some("crypto")), AssetType::Crypto);
        assert_eq!(asset_type_for_code(None), AssetType::Stock);
    }
}
