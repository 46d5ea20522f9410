use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Asset classification shared by holdings, pricing and market schedules.
///
/// `Forex` never appears on a merged position; it identifies currency pairs
/// for pricing adapters and for the forex trading calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Crypto,
    Stock,
    Etf,
    MutualFund,
    Cash,
    Forex,
}

impl AssetType {
    pub const ALL: [AssetType; 6] = [
        AssetType::Crypto,
        AssetType::Stock,
        AssetType::Etf,
        AssetType::MutualFund,
        AssetType::Cash,
        AssetType::Forex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Stock => "stock",
            Self::Etf => "etf",
            Self::MutualFund => "mutual_fund",
            Self::Cash => "cash",
            Self::Forex => "forex",
        }
    }

    /// The refresh cadence this asset type belongs to.
    ///
    /// Cash has no cadence: it is priced synthetically and never refreshed.
    pub fn price_class(&self) -> Option<PriceClass> {
        match self {
            Self::Crypto => Some(PriceClass::Crypto),
            Self::Stock | Self::Etf | Self::MutualFund | Self::Forex => {
                Some(PriceClass::Traditional)
            }
            Self::Cash => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(Self::Crypto),
            "stock" => Ok(Self::Stock),
            "etf" => Ok(Self::Etf),
            "mutual_fund" | "mutualfund" => Ok(Self::MutualFund),
            "cash" => Ok(Self::Cash),
            "forex" => Ok(Self::Forex),
            other => Err(format!("Unknown asset type: {}", other)),
        }
    }
}

/// Broad asset class with its own price refresh timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceClass {
    /// Crypto prices; markets never close.
    Crypto,
    /// Stocks, ETFs, mutual funds and forex; gated by market hours.
    Traditional,
}

impl PriceClass {
    pub fn includes(&self, asset_type: AssetType) -> bool {
        asset_type.price_class() == Some(*self)
    }
}

impl fmt::Display for PriceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Traditional => write!(f, "traditional"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&AssetType::MutualFund).unwrap();
        assert_eq!(json, "\"mutual_fund\"");
        let parsed: AssetType = serde_json::from_str("\"etf\"").unwrap();
        assert_eq!(parsed, AssetType::Etf);
    }

    #[test]
    fn test_from_str_is_lenient_on_case() {
        assert_eq!("Stock".parse::<AssetType>().unwrap(), AssetType::Stock);
        assert!("bond".parse::<AssetType>().is_err());
    }

    #[test]
    fn test_price_class_membership() {
        assert!(PriceClass::Crypto.includes(AssetType::Crypto));
        assert!(PriceClass::Traditional.includes(AssetType::MutualFund));
        assert!(PriceClass::Traditional.includes(AssetType::Forex));
        assert!(!PriceClass::Traditional.includes(AssetType::Cash));
        assert!(!PriceClass::Crypto.includes(AssetType::Cash));
    }
}
