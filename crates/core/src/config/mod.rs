//! Display-layer configuration.
//!
//! Every field has a default so a partial JSON object (or `{}`) is valid.

use std::collections::BTreeMap;
use std::time::Duration;

use fintech_market_data::AssetType;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::history::ChartPeriod;
use crate::market_hours::{default_market_hours, MarketSchedule};
use crate::utils::time_utils::parse_hh_mm;

/// Base currency every provider prices in.
pub const BASE_CURRENCY: &str = "USD";

/// Presentation order of holdings in the snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Value,
    Name,
    Change,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FintechConfig {
    /// Crypto price refresh cadence, in milliseconds
    pub crypto_price_update_interval: u64,
    /// Stock/ETF/fund/forex price refresh cadence, in milliseconds
    pub stock_price_update_interval: u64,
    /// Host-local `HH:MM` of the daily holdings sync
    pub holdings_sync_time: String,
    pub stale_holdings_threshold: u64,
    pub stale_prices_threshold: u64,
    /// Overrides every adapter's retry budget when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    pub currency: String,
    pub sort_by: SortOrder,
    /// Daily history retention, in days
    pub history_retention: u32,
    /// Hourly history retention, in hours
    pub hourly_retention: u32,
    pub chart_period: ChartPeriod,
    pub market_hours: BTreeMap<AssetType, MarketSchedule>,
}

impl Default for FintechConfig {
    fn default() -> Self {
        Self {
            crypto_price_update_interval: 5 * 60 * 1000,
            stock_price_update_interval: 20 * 60 * 1000,
            holdings_sync_time: "07:45".to_string(),
            stale_holdings_threshold: 25 * 60 * 60 * 1000,
            stale_prices_threshold: 60 * 60 * 1000,
            max_retries: None,
            currency: BASE_CURRENCY.to_string(),
            sort_by: SortOrder::Value,
            history_retention: 1825,
            hourly_retention: 720,
            chart_period: ChartPeriod::OneMonth,
            market_hours: default_market_hours(),
        }
    }
}

impl FintechConfig {
    /// Parses a config object, filling built-in market hours for asset types
    /// the object leaves out.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let config: FintechConfig = serde_json::from_value(value)?;
        config.normalized()
    }

    /// Upper-cases the currency, restores default schedules for omitted asset
    /// types and validates everything that is not checked elsewhere.
    pub fn normalized(mut self) -> Result<Self> {
        self.currency = self.currency.trim().to_ascii_uppercase();
        if self.currency.is_empty() {
            self.currency = BASE_CURRENCY.to_string();
        }
        for (asset_type, schedule) in default_market_hours() {
            self.market_hours.entry(asset_type).or_insert(schedule);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        parse_hh_mm(&self.holdings_sync_time).map_err(|e| {
            Error::InvalidConfigValue(format!("holdingsSyncTime: {}", e))
        })?;
        if self.crypto_price_update_interval == 0 || self.stock_price_update_interval == 0 {
            return Err(Error::InvalidConfigValue(
                "price update intervals must be positive".to_string(),
            ));
        }
        if self.hourly_retention == 0 || self.history_retention == 0 {
            return Err(Error::InvalidConfigValue(
                "history retention must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn holdings_sync_minutes(&self) -> Result<u32> {
        parse_hh_mm(&self.holdings_sync_time)
    }

    pub fn crypto_interval(&self) -> Duration {
        Duration::from_millis(self.crypto_price_update_interval)
    }

    pub fn stock_interval(&self) -> Duration {
        Duration::from_millis(self.stock_price_update_interval)
    }

    /// Whether holdings need converting out of the base currency.
    pub fn needs_conversion(&self) -> bool {
        self.currency != BASE_CURRENCY
    }
}
