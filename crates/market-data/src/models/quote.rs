use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest price for a symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: Decimal,
    /// Percent change over the last 24h (or since previous close)
    #[serde(rename = "change24h")]
    pub change_24h: Decimal,
}

impl PriceQuote {
    pub fn new(price: Decimal, change_24h: Decimal) -> Self {
        Self { price, change_24h }
    }
}

/// Latest rate for a currency pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForexQuote {
    pub rate: Decimal,
    #[serde(rename = "change24h")]
    pub change_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A currency pair in `BASE/QUOTE` notation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForexPair {
    pub base: String,
    pub quote: String,
}

impl ForexPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// The pair with base and quote swapped.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for ForexPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for ForexPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| format!("Invalid forex pair '{}', expected A/B", s))?;
        let base = base.trim();
        let quote = quote.trim();
        if base.is_empty() || quote.is_empty() {
            return Err(format!("Invalid forex pair '{}', expected A/B", s));
        }
        Ok(Self::new(base.to_uppercase(), quote.to_uppercase()))
    }
}
