use fintech_market_data::{ForexPair, ForexQuote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A currency-pair rate as shown to the display layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForexRate {
    /// `BASE/QUOTE`
    pub pair: String,
    pub rate: Decimal,
    #[serde(rename = "change24h")]
    pub change_24h: Decimal,
    #[serde(default)]
    pub is_inverse: bool,
    #[serde(default)]
    pub error: bool,
}

impl ForexRate {
    pub fn from_quote(pair: &ForexPair, quote: &ForexQuote) -> Self {
        Self {
            pair: pair.to_string(),
            rate: quote.rate,
            change_24h: quote.change_24h,
            is_inverse: false,
            error: false,
        }
    }

    /// Placeholder for a pair whose fetch failed.
    pub fn failed(pair: &ForexPair) -> Self {
        Self {
            pair: pair.to_string(),
            rate: Decimal::ZERO,
            change_24h: Decimal::ZERO,
            is_inverse: false,
            error: true,
        }
    }

    /// The mechanically derived opposite pair: `1/rate`, negated change.
    ///
    /// `None` for failed fetches and zero rates.
    pub fn inverse(&self) -> Option<ForexRate> {
        if self.error || self.rate.is_zero() {
            return None;
        }
        let pair = match self.pair.parse::<ForexPair>() {
            Ok(pair) => pair.inverse().to_string(),
            Err(_) => return None,
        };
        Some(ForexRate {
            pair,
            rate: Decimal::ONE / self.rate,
            change_24h: -self.change_24h,
            is_inverse: true,
            error: false,
        })
    }
}

/// Each rate followed by its inverse, when it has one.
pub fn with_inverses(rates: Vec<ForexRate>) -> Vec<ForexRate> {
    let mut out = Vec::with_capacity(rates.len() * 2);
    for rate in rates {
        let inverse = rate.inverse();
        out.push(rate);
        out.extend(inverse);
    }
    out
}
