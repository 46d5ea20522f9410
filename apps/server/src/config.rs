use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

pub struct Config {
    pub listen_addr: SocketAddr,
    /// Snapshot, history, manual holdings and credential files
    pub data_dir: PathBuf,
    /// Optional JSON file with the initial sync configuration
    pub config_path: Option<PathBuf>,
    pub secret_key: Option<String>,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("FINTECH_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8088".to_string())
            .parse()
            .context("Invalid FINTECH_LISTEN_ADDR")?;
        let data_dir = std::env::var("FINTECH_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let config_path = std::env::var("FINTECH_CONFIG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let secret_key = std::env::var("FINTECH_SECRET_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let cors_allow = std::env::var("FINTECH_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("FINTECH_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        Ok(Self {
            listen_addr,
            data_dir: PathBuf::from(data_dir),
            config_path,
            secret_key,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
