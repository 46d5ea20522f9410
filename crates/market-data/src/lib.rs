//! Fintech Market Data Crate
//!
//! Provider adapters and the resilience layer that every outbound call to a
//! portfolio data source goes through.
//!
//! # Overview
//!
//! The crate supports:
//! - Holdings sources: crypto exchanges and brokerage aggregators
//! - Price sources: crypto exchanges and quote APIs (stocks, funds, forex)
//! - Per-provider error classification and exponential backoff
//! - A coarse timeout/retry layer for slow asynchronous upstreams
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   Orchestrator   |  (fintech-core)
//! +------------------+
//!          |
//!          v
//! +--------------------+     +-------------------+
//! | PortfolioProvider  | --> |  classify_error   |  (UpstreamError -> ProviderError)
//! +--------------------+     +-------------------+
//!          |                          |
//!          v                          v
//! +--------------------+     +-------------------+
//! |  retry_with_backoff| <-- |   RetryConfig     |
//! +--------------------+     +-------------------+
//!          |
//!          v
//! +--------------------+
//! |  Upstream HTTP API |  (Coinbase, Twelve Data, SnapTrade)
//! +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PortfolioProvider`] - Capability-described adapter contract
//! - [`ProviderError`] / [`ErrorCode`] - Classified failures
//! - [`RawHolding`] - A holdings record from one source
//! - [`PriceQuote`] / [`ForexQuote`] - Latest price and rate
//! - [`AssetType`] / [`PriceClass`] - Asset taxonomy and update cadence classes

pub mod errors;
pub mod models;
pub mod provider;
pub mod retry;

pub use errors::{ErrorCode, ProviderError, TransportFailure, UpstreamError};
pub use models::{AssetType, ForexPair, ForexQuote, PriceClass, PriceQuote, RawHolding};
pub use provider::{
    CreditsInfo, ErrorPatterns, PortfolioProvider, ProviderCapabilities, ProviderKind,
    RequestAuthenticator, RetryConfig, SignableRequest,
};
pub use retry::{retry_with_backoff, with_timeout_retry, CoarseRetryPolicy};
