//! Market data models
//!
//! This module contains the core data types exchanged with providers:
//! - `asset` - Asset type classification (AssetType) and price cadence class (PriceClass)
//! - `holding` - Raw holdings records as returned by an adapter (RawHolding)
//! - `quote` - Price and forex quote structures (PriceQuote, ForexQuote)

mod asset;
mod holding;
mod quote;

pub use asset::{AssetType, PriceClass};
pub use holding::RawHolding;
pub use quote::{ForexPair, ForexQuote, PriceQuote};
