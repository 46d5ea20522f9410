use std::{
    fs,
    path::PathBuf,
    sync::Mutex,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fintech_core::{
    errors::Error,
    secrets::{credential_file_name, CredentialStore},
    Result,
};

/// Per-provider credential files under the data directory.
///
/// Each provider has its own `<provider>-credentials.enc`. A file holding
/// `{nonce, ciphertext}` is decrypted with ChaCha20-Poly1305; anything else
/// is read as the plain credential object.
#[derive(Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
    encryption_key: Option<[u8; 32]>,
    lock: Mutex<()>,
}

#[derive(Serialize, Deserialize)]
struct EncryptedCredentials {
    #[serde(default)]
    version: u32,
    nonce: String,
    ciphertext: String,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>, encryption_key: Option<&str>) -> Result<Self> {
        let key = match encryption_key {
            Some(value) if !value.trim().is_empty() => Some(decode_encryption_key(value)?),
            _ => None,
        };

        Ok(Self {
            dir: dir.into(),
            encryption_key: key,
            lock: Mutex::new(()),
        })
    }

    fn file_for(&self, provider: &str) -> PathBuf {
        self.dir.join(credential_file_name(provider))
    }

    fn decrypt(&self, provider: &str, value: Value) -> Result<Value> {
        let key = self.encryption_key.ok_or_else(|| {
            Error::Secret(format!(
                "FINTECH_SECRET_KEY must be set to decrypt {} credentials",
                provider
            ))
        })?;
        let enc: EncryptedCredentials = serde_json::from_value(value)?;
        let nonce_bytes = BASE64
            .decode(enc.nonce)
            .map_err(|e| Error::Secret(format!("Failed to decode nonce: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(Error::Secret("Nonce must be 12 bytes".into()));
        }
        let cipher_bytes = BASE64
            .decode(enc.ciphertext)
            .map_err(|e| Error::Secret(format!("Failed to decode ciphertext: {e}")))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, cipher_bytes.as_ref())
            .map_err(|_| Error::Secret(format!("Failed to decrypt {} credentials", provider)))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_credentials(&self, provider: &str) -> Result<Option<Value>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Secret("Credential store lock poisoned".into()))?;
        let path = self.file_for(provider);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path)?;
        if raw.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_slice(&raw)?;
        if value.get("ciphertext").is_some() {
            self.decrypt(provider, value).map(Some)
        } else {
            Ok(Some(value))
        }
    }
}

fn decode_encryption_key(raw: &str) -> Result<[u8; 32]> {
    let trimmed = raw.trim();
    let decoded = match BASE64.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(_) if trimmed.len() == 32 => trimmed.as_bytes().to_vec(),
        Err(_) => {
            return Err(Error::Secret(
                "FINTECH_SECRET_KEY must be a base64 string or 32-byte ascii value".into(),
            ))
        }
    };

    if decoded.len() != 32 {
        return Err(Error::Secret(
            "FINTECH_SECRET_KEY must decode to exactly 32 bytes".into(),
        ));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}
