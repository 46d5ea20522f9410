use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use fintech_core::{sync::SyncPaths, FintechConfig};

use crate::{
    config::Config, controller::SyncController, events::EventBus,
    secrets::FileCredentialStore,
};

pub struct AppState {
    pub controller: Arc<SyncController>,
    pub event_bus: EventBus,
    pub data_root: String,
}

pub fn init_tracing() {
    let log_format = std::env::var("FINTECH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// The config from `FINTECH_CONFIG`, or the defaults when none is set.
pub fn load_initial_config(config: &Config) -> anyhow::Result<FintechConfig> {
    let Some(path) = &config.config_path else {
        return Ok(FintechConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Config file {} is not valid JSON", path.display()))?;
    Ok(FintechConfig::from_json(value)?)
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.data_dir.display())
    })?;
    let data_root = config.data_dir.to_string_lossy().to_string();
    tracing::info!("Data directory: {}", data_root);

    let credentials = Arc::new(FileCredentialStore::new(
        &config.data_dir,
        config.secret_key.as_deref(),
    )?);
    let event_bus = EventBus::new(256);
    let controller = Arc::new(SyncController::new(
        SyncPaths::in_dir(&config.data_dir),
        credentials,
        Arc::new(event_bus.clone()),
    ));

    Ok(Arc::new(AppState {
        controller,
        event_bus,
        data_root,
    }))
}
