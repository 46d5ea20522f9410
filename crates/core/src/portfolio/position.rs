use fintech_market_data::AssetType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A merged holding with its current price attached.
///
/// Unique per `(symbol, asset_type)` within a snapshot. Rebuilt from scratch
/// on every holdings sync; price-only cycles mutate it in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub quantity: Decimal,
    #[serde(default)]
    pub cost_basis: Decimal,
    #[serde(default)]
    pub open_pnl: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_purchase_price: Option<Decimal>,
    /// Source tags in order of first appearance, duplicates kept
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, rename = "change24h")]
    pub change_24h: Decimal,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub gain_loss_percent: Option<Decimal>,
}

impl Position {
    pub fn new(symbol: impl Into<String>, asset_type: AssetType, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            asset_type,
            quantity,
            cost_basis: Decimal::ZERO,
            open_pnl: Decimal::ZERO,
            avg_purchase_price: None,
            sources: Vec::new(),
            price: Decimal::ZERO,
            change_24h: Decimal::ZERO,
            value: Decimal::ZERO,
            gain_loss_percent: None,
        }
    }

    pub fn merge_key(&self) -> String {
        format!("{}:{}", self.symbol, self.asset_type)
    }

    pub fn has_cost_basis(&self) -> bool {
        self.cost_basis > Decimal::ZERO
    }
}
