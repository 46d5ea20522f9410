//! Credential-store boundary.
//!
//! Core only asks for a provider's plain credential object. How it is kept
//! at rest (and decrypted) belongs to the implementation.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{Error, Result};

/// Provider keys used to look up credentials.
pub const COINBASE_CREDENTIALS: &str = "coinbase";
pub const SNAPTRADE_CREDENTIALS: &str = "snaptrade";
pub const TWELVE_DATA_CREDENTIALS: &str = "twelvedata";

/// File name holding one provider's credentials, e.g. `snaptrade-credentials.enc`.
pub fn credential_file_name(provider: &str) -> String {
    format!("{}-credentials.enc", provider.trim().to_lowercase())
}

pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is stored for `provider`.
    fn load_credentials(&self, provider: &str) -> Result<Option<Value>>;
}

/// Loads and deserializes a provider's credentials into `T`.
pub fn load_typed<T: DeserializeOwned>(
    store: &dyn CredentialStore,
    provider: &str,
) -> Result<Option<T>> {
    match store.load_credentials(provider)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::Secret(format!("Malformed {} credentials: {}", provider, e))),
        None => Ok(None),
    }
}

/// Credentials held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialStore {
    entries: HashMap<String, Value>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: &str, credentials: Value) -> Self {
        self.entries.insert(provider.to_lowercase(), credentials);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn load_credentials(&self, provider: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(&provider.to_lowercase()).cloned())
    }
}
