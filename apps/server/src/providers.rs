use std::sync::Arc;

use serde::Deserialize;

use fintech_core::secrets::{
    load_typed, CredentialStore, COINBASE_CREDENTIALS, SNAPTRADE_CREDENTIALS,
    TWELVE_DATA_CREDENTIALS,
};
use fintech_market_data::provider::{
    coinbase::{CoinbaseCredentials, CoinbaseKeySigner, CoinbaseProvider},
    snaptrade::{SnapTradeCredentials, SnapTradeProvider},
    twelve_data::TwelveDataProvider,
};
use fintech_market_data::{PortfolioProvider, RequestAuthenticator};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwelveDataCredentials {
    #[serde(default)]
    api_key: String,
}

fn load_or_warn<T: serde::de::DeserializeOwned>(
    store: &dyn CredentialStore,
    provider: &str,
) -> Option<T> {
    match load_typed(store, provider) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring {} credentials: {}", provider, e);
            None
        }
    }
}

/// Builds every provider the stored credentials allow.
///
/// Coinbase is always present for public crypto prices and only lists
/// holdings when its key pair is stored.
pub fn build_providers(
    store: &dyn CredentialStore,
    max_retries: Option<u32>,
) -> Vec<Arc<dyn PortfolioProvider>> {
    let mut providers: Vec<Arc<dyn PortfolioProvider>> = Vec::new();

    let signer = load_or_warn::<CoinbaseCredentials>(store, COINBASE_CREDENTIALS)
        .filter(CoinbaseCredentials::is_complete)
        .map(|creds| Arc::new(CoinbaseKeySigner::new(creds)) as Arc<dyn RequestAuthenticator>);
    if signer.is_none() {
        tracing::info!("Coinbase credentials not found; using public price endpoints only");
    }
    providers.push(Arc::new(
        CoinbaseProvider::new(signer).with_max_retries(max_retries),
    ));

    match load_or_warn::<TwelveDataCredentials>(store, TWELVE_DATA_CREDENTIALS) {
        Some(creds) if !creds.api_key.trim().is_empty() => {
            providers.push(Arc::new(
                TwelveDataProvider::new(Some(creds.api_key)).with_max_retries(max_retries),
            ));
        }
        _ => tracing::info!("Twelve Data API key not found; stock and forex prices disabled"),
    }

    match load_or_warn::<SnapTradeCredentials>(store, SNAPTRADE_CREDENTIALS) {
        Some(creds) if creds.is_complete() => {
            providers.push(Arc::new(
                SnapTradeProvider::new(creds).with_max_retries(max_retries),
            ));
        }
        Some(_) => tracing::warn!("SnapTrade credentials incomplete; brokerage sync disabled"),
        None => tracing::info!("SnapTrade credentials not found; brokerage sync disabled"),
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintech_core::secrets::StaticCredentialStore;
    use serde_json::json;

    #[test]
    fn no_credentials_registers_coinbase_only() {
        let providers = build_providers(&StaticCredentialStore::new(), None);
        let ids: Vec<_> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["COINBASE"]);
    }

    #[test]
    fn complete_credentials_register_every_provider() {
        let store = StaticCredentialStore::new()
            .with(COINBASE_CREDENTIALS, json!({"apiKey": "k", "apiSecret": "s"}))
            .with(TWELVE_DATA_CREDENTIALS, json!({"apiKey": "td"}))
            .with(
                SNAPTRADE_CREDENTIALS,
                json!({"clientId": "c", "consumerKey": "k", "userId": "u", "userSecret": "s"}),
            );
        let providers = build_providers(&store, Some(2));
        assert_eq!(providers.len(), 3);
    }

    #[test]
    fn incomplete_snaptrade_credentials_are_skipped() {
        let store = StaticCredentialStore::new()
            .with(SNAPTRADE_CREDENTIALS, json!({"clientId": "c", "consumerKey": "", "userId": "u", "userSecret": "s"}));
        assert_eq!(build_providers(&store, None).len(), 1);
    }
}
