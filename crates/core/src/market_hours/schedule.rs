use std::collections::BTreeMap;

use chrono_tz::Tz;
use fintech_market_data::AssetType;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::utils::time_utils::{parse_hh_mm, parse_timezone};

const DEFAULT_TIMEZONE: &str = "America/New_York";

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_days() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}

/// Trading window for one asset type, as configured.
///
/// Equity-style schedules use `open`/`close`/`days` (0 = Sunday .. 6 = Saturday).
/// Forex-style schedules use `sundayOpen`/`fridayClose` and trade around the
/// clock in between.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSchedule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
    #[serde(default = "default_days")]
    pub days: Vec<u8>,
    #[serde(default)]
    pub post_close_poll: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunday_open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friday_close: Option<String>,
}

impl MarketSchedule {
    pub fn equity(open: &str, close: &str, post_close_poll: bool) -> Self {
        Self {
            enabled: true,
            timezone: default_timezone(),
            open: Some(open.to_string()),
            close: Some(close.to_string()),
            days: default_days(),
            post_close_poll,
            sunday_open: None,
            friday_close: None,
        }
    }

    pub fn forex(sunday_open: &str, friday_close: &str) -> Self {
        Self {
            enabled: true,
            timezone: default_timezone(),
            open: None,
            close: None,
            days: Vec::new(),
            post_close_poll: false,
            sunday_open: Some(sunday_open.to_string()),
            friday_close: Some(friday_close.to_string()),
        }
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validates and resolves the schedule. `None` means "always open".
    pub(crate) fn compile(&self, asset_type: AssetType) -> Result<Option<CompiledSchedule>> {
        if !self.enabled {
            return Ok(None);
        }
        let context = |e: Error| match e {
            Error::InvalidConfigValue(msg) => {
                Error::InvalidConfigValue(format!("marketHours.{}: {}", asset_type, msg))
            }
            other => other,
        };

        let tz = parse_timezone(&self.timezone).map_err(context)?;

        let window = match (&self.sunday_open, &self.friday_close, &self.open, &self.close) {
            (Some(sunday_open), Some(friday_close), _, _) => TradingWindow::Forex {
                sunday_open: parse_hh_mm(sunday_open).map_err(context)?,
                friday_close: parse_hh_mm(friday_close).map_err(context)?,
            },
            (_, _, Some(open), Some(close)) => {
                if let Some(bad) = self.days.iter().find(|d| **d > 6) {
                    return Err(context(Error::InvalidConfigValue(format!(
                        "day {} out of range 0-6",
                        bad
                    ))));
                }
                TradingWindow::Equity {
                    open: parse_hh_mm(open).map_err(context)?,
                    close: parse_hh_mm(close).map_err(context)?,
                    days: self.days.clone(),
                    post_close_poll: self.post_close_poll,
                }
            }
            _ => {
                return Err(context(Error::InvalidConfigValue(
                    "needs open/close or sundayOpen/fridayClose".to_string(),
                )))
            }
        };

        Ok(Some(CompiledSchedule { tz, window }))
    }
}

/// Built-in schedules: US equity hours for stocks and funds, the Sunday 17:00
/// to Friday 17:00 New York session for forex.
pub fn default_market_hours() -> BTreeMap<AssetType, MarketSchedule> {
    let mut hours = BTreeMap::new();
    for asset_type in [AssetType::Stock, AssetType::Etf, AssetType::MutualFund] {
        hours.insert(asset_type, MarketSchedule::equity("09:30", "16:00", true));
    }
    hours.insert(AssetType::Forex, MarketSchedule::forex("17:00", "17:00"));
    hours
}

/// A validated schedule with its timezone and minute offsets resolved.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CompiledSchedule {
    pub tz: Tz,
    pub window: TradingWindow,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TradingWindow {
    Equity {
        open: u32,
        close: u32,
        days: Vec<u8>,
        post_close_poll: bool,
    },
    Forex {
        sunday_open: u32,
        friday_close: u32,
    },
}
