//! The persisted, broadcastable portfolio state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BASE_CURRENCY;
use crate::errors::Result;
use crate::portfolio::{ForexRate, PortfolioTotals, Position};
use crate::utils::fs_utils::{read_json_optional, write_json_atomic};

fn default_conversion_rate() -> Decimal {
    Decimal::ONE
}

fn default_currency() -> String {
    BASE_CURRENCY.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    #[serde(default)]
    pub holdings: Vec<Position>,
    #[serde(default)]
    pub forex: Vec<ForexRate>,
    #[serde(default)]
    pub total_value: Decimal,
    #[serde(default)]
    pub total_cost_basis: Decimal,
    #[serde(default)]
    pub total_gain_loss_percent: Option<Decimal>,
    #[serde(default = "default_conversion_rate")]
    pub conversion_rate: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Completion time of the last full holdings sync
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_price_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_crypto_price_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_stock_price_update: Option<DateTime<Utc>>,
    /// Manual holdings file mtime (unix ms) seen at the last holdings sync
    #[serde(default)]
    pub manual_holdings_mod_time: Option<i64>,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default)]
    pub invalid_symbols: Vec<String>,
    #[serde(default)]
    pub rate_limited_symbols: Vec<String>,
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        Self {
            holdings: Vec::new(),
            forex: Vec::new(),
            total_value: Decimal::ZERO,
            total_cost_basis: Decimal::ZERO,
            total_gain_loss_percent: None,
            conversion_rate: Decimal::ONE,
            currency: default_currency(),
            last_updated: None,
            last_price_update: None,
            last_crypto_price_update: None,
            last_stock_price_update: None,
            manual_holdings_mod_time: None,
            has_error: false,
            invalid_symbols: Vec::new(),
            rate_limited_symbols: Vec::new(),
        }
    }
}

impl PortfolioSnapshot {
    pub fn apply_totals(&mut self, totals: &PortfolioTotals) {
        self.total_value = totals.total_value;
        self.total_cost_basis = totals.total_cost_basis;
        self.total_gain_loss_percent = totals.total_gain_loss_percent;
    }
}

/// Whole-file JSON storage for the snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or unreadable.
    pub fn load(&self) -> Option<PortfolioSnapshot> {
        match read_json_optional(&self.path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable snapshot {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, snapshot: &PortfolioSnapshot) -> Result<()> {
        write_json_atomic(&self.path, snapshot)
    }
}
