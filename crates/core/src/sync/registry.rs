use std::collections::BTreeMap;
use std::sync::Arc;

use fintech_market_data::{AssetType, CreditsInfo, PortfolioProvider};
use log::debug;

/// Typed lookup of adapters by capability and asset type.
///
/// Providers are kept in priority order (lowest value first); ties keep
/// registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn PortfolioProvider>>,
}

impl ProviderRegistry {
    pub fn new(mut providers: Vec<Arc<dyn PortfolioProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        for provider in &providers {
            debug!(
                "Registered provider {} (priority {}, holdings: {}, pricing: {}, forex: {})",
                provider.id(),
                provider.priority(),
                provider.supports_holdings(),
                provider.supports_pricing(),
                provider.supports_forex()
            );
        }
        Self { providers }
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn holdings_providers(&self) -> impl Iterator<Item = &Arc<dyn PortfolioProvider>> {
        self.providers.iter().filter(|p| p.supports_holdings())
    }

    /// The highest-priority adapter that prices `asset_type`.
    pub fn pricing_provider_for(&self, asset_type: AssetType) -> Option<&Arc<dyn PortfolioProvider>> {
        self.providers
            .iter()
            .find(|p| p.supports_pricing() && p.capabilities().handles(asset_type))
    }

    pub fn forex_provider(&self) -> Option<&Arc<dyn PortfolioProvider>> {
        self.providers.iter().find(|p| p.supports_forex())
    }

    /// Credit usage of every metered provider, keyed by provider id.
    pub fn credits(&self) -> BTreeMap<&'static str, CreditsInfo> {
        self.providers
            .iter()
            .filter_map(|p| p.credits().map(|c| (p.id(), c)))
            .collect()
    }
}
