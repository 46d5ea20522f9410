use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::AssetType;

/// A single holdings record as produced by an adapter or a manual entry.
///
/// Zero-quantity records are kept; filtering them is the caller's decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHolding {
    pub symbol: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub quantity: Decimal,
    /// Total amount paid, when the source tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_pnl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_purchase_price: Option<Decimal>,
    /// Source tag, e.g. "coinbase-api", "snaptrade", "manual"
    pub source: String,
}

impl RawHolding {
    pub fn new(
        symbol: impl Into<String>,
        asset_type: AssetType,
        quantity: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            asset_type,
            quantity,
            cost_basis: None,
            open_pnl: None,
            avg_purchase_price: None,
            source: source.into(),
        }
    }

    pub fn with_cost_basis(mut self, cost_basis: Decimal) -> Self {
        self.cost_basis = Some(cost_basis);
        self
    }

    pub fn with_open_pnl(mut self, open_pnl: Decimal) -> Self {
        self.open_pnl = Some(open_pnl);
        self
    }

    pub fn with_avg_purchase_price(mut self, price: Decimal) -> Self {
        self.avg_purchase_price = Some(price);
        self
    }

    /// Merge key: `symbol:asset_type`.
    pub fn merge_key(&self) -> String {
        format!("{}:{}", self.symbol, self.asset_type)
    }
}
