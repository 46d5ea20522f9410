//! Portfolio data provider abstractions and implementations.
//!
//! This module contains:
//! - The `PortfolioProvider` trait that all adapters implement
//! - Provider capabilities and retry configuration
//! - Shared error classification patterns
//! - The request authentication boundary
//! - Concrete adapters (Coinbase, Twelve Data, SnapTrade)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Capability-described**: Each adapter declares which asset types it can hold or price
//! - **Closed**: Adapters come from a fixed set of variants ([`ProviderKind`])
//! - **Resilient**: Every outbound call runs through the retry executor with the
//!   adapter's own classifier and backoff policy

mod auth;
mod capabilities;
mod classify;
mod parse;
mod traits;

pub mod coinbase;
pub mod snaptrade;
pub mod twelve_data;

// Re-exports
pub use auth::{RequestAuthenticator, SignableRequest};
pub use capabilities::{CreditsInfo, ProviderCapabilities, ProviderKind, RetryConfig};
pub use classify::ErrorPatterns;
pub use traits::PortfolioProvider;
