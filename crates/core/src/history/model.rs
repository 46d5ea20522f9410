use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use fintech_market_data::AssetType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One intraday point; at most one per UTC hour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
    pub crypto_value: Decimal,
    pub traditional_value: Decimal,
}

impl HourlySnapshot {
    /// `YYYY-MM-DDTHH`, the first 13 characters of the ISO timestamp.
    pub fn bucket(&self) -> String {
        hour_bucket(self.timestamp)
    }
}

pub(crate) fn hour_bucket(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H").to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyHolding {
    pub quantity: Decimal,
    pub price: Decimal,
    pub value: Decimal,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
}

/// One end-of-day point keyed by UTC date, with a per-symbol breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub crypto_value: Decimal,
    pub traditional_value: Decimal,
    #[serde(default)]
    pub holdings: BTreeMap<String, DailyHolding>,
}

/// Persisted history file contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistory {
    #[serde(default)]
    pub hourly: Vec<HourlySnapshot>,
    #[serde(default)]
    pub daily: Vec<DailySnapshot>,
}

/// Chart ranges offered to the display layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChartPeriod {
    OneDay,
    OneWeek,
    #[default]
    OneMonth,
    ThreeMonths,
    OneYear,
    All,
}

impl ChartPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::OneYear => "1Y",
            Self::All => "All",
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "1w" => Ok(Self::OneWeek),
            "1m" => Ok(Self::OneMonth),
            "3m" => Ok(Self::ThreeMonths),
            "1y" => Ok(Self::OneYear),
            "all" => Ok(Self::All),
            other => Err(format!("unknown chart period '{}'", other)),
        }
    }
}

impl TryFrom<String> for ChartPeriod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChartPeriod> for String {
    fn from(period: ChartPeriod) -> Self {
        period.as_str().to_string()
    }
}

/// Chart points of a single granularity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "granularity", content = "points", rename_all = "lowercase")]
pub enum ChartData {
    Hourly(Vec<HourlySnapshot>),
    Daily(Vec<DailySnapshot>),
}

impl ChartData {
    pub fn len(&self) -> usize {
        match self {
            Self::Hourly(points) => points.len(),
            Self::Daily(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub hourly_count: usize,
    pub daily_count: usize,
    pub oldest_daily: Option<NaiveDate>,
    pub newest_daily: Option<NaiveDate>,
    pub oldest_hourly: Option<DateTime<Utc>>,
    pub newest_hourly: Option<DateTime<Utc>>,
}
