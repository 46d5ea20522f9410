//! Hand-maintained holdings and forex pairs.
//!
//! The file is read-only input. Its modification time is what triggers a
//! holdings resync, not its content.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use fintech_market_data::{AssetType, ForexPair, RawHolding};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::utils::fs_utils::read_json_optional;

pub const MANUAL_SOURCE: &str = "manual";

fn default_source() -> String {
    MANUAL_SOURCE.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualHolding {
    pub symbol: String,
    pub quantity: Decimal,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<Decimal>,
    #[serde(default = "default_source")]
    pub source: String,
}

impl From<ManualHolding> for RawHolding {
    fn from(entry: ManualHolding) -> Self {
        let mut holding = RawHolding::new(
            entry.symbol.trim().to_uppercase(),
            entry.asset_type,
            entry.quantity,
            entry.source,
        );
        holding.cost_basis = entry.cost_basis;
        holding
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManualForexEntry {
    pub pair: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualHoldingsFile {
    #[serde(default)]
    pub holdings: Vec<ManualHolding>,
    #[serde(default)]
    pub forex: Vec<ManualForexEntry>,
}

impl ManualHoldingsFile {
    pub fn raw_holdings(&self) -> Vec<RawHolding> {
        self.holdings.iter().cloned().map(RawHolding::from).collect()
    }

    /// Configured pairs; malformed entries are logged and skipped.
    pub fn forex_pairs(&self) -> Vec<ForexPair> {
        self.forex
            .iter()
            .filter_map(|entry| match entry.pair.parse::<ForexPair>() {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("Skipping manual forex entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Location of the manual holdings file.
#[derive(Debug, Clone)]
pub struct ManualHoldingsSource {
    path: PathBuf,
}

impl ManualHoldingsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty one.
    pub fn load(&self) -> Result<ManualHoldingsFile> {
        read_json_optional(&self.path).map(Option::unwrap_or_default)
    }

    /// Modification time in unix milliseconds; `None` when there is no file.
    pub fn modified_ms(&self) -> Result<Option<i64>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified()?;
        let ms = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Unexpected(format!("File time before epoch: {}", e)))?
            .as_millis();
        Ok(Some(i64::try_from(ms).unwrap_or(i64::MAX)))
    }
}
