//! Fintech Core - portfolio sync engine.
//!
//! Merges holdings from every configured source into one position list,
//! prices it, keeps an hourly/daily value history and publishes snapshots
//! to the display layer. Provider adapters live in `fintech-market-data`;
//! this crate decides when to call them and what to do with the results.

pub mod config;
pub mod errors;
pub mod events;
pub mod history;
pub mod manual;
pub mod market_hours;
pub mod portfolio;
pub mod secrets;
pub mod snapshot;
pub mod sync;
pub mod utils;

pub use config::FintechConfig;
pub use snapshot::PortfolioSnapshot;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
