use std::sync::Arc;

use tokio::sync::Mutex;

use fintech_core::{
    events::PortfolioEventSink,
    secrets::CredentialStore,
    sync::{ProviderRegistry, SyncOrchestrator, SyncPaths, SyncScheduler},
    FintechConfig, Result,
};

use crate::providers::build_providers;

/// Outcome of a begin-sync request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStart {
    Started,
    AlreadyRunning,
    NotInitialized,
}

#[derive(Default)]
struct ControllerState {
    orchestrator: Option<Arc<SyncOrchestrator>>,
    scheduler: Option<SyncScheduler>,
}

/// Owns the orchestrator and its timers on behalf of the display layer.
pub struct SyncController {
    paths: SyncPaths,
    credentials: Arc<dyn CredentialStore>,
    sink: Arc<dyn PortfolioEventSink>,
    state: Mutex<ControllerState>,
}

impl SyncController {
    pub fn new(
        paths: SyncPaths,
        credentials: Arc<dyn CredentialStore>,
        sink: Arc<dyn PortfolioEventSink>,
    ) -> Self {
        Self {
            paths,
            credentials,
            sink,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Rebuilds the orchestrator for `config`.
    ///
    /// Running timers are stopped and restarted against the new orchestrator.
    pub async fn initialize(&self, config: FintechConfig) -> Result<()> {
        let providers = build_providers(self.credentials.as_ref(), config.max_retries);
        let registry = ProviderRegistry::new(providers);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            config,
            registry,
            self.paths.clone(),
            self.sink.clone(),
        )?);

        let mut state = self.state.lock().await;
        let restart = match state.scheduler.take() {
            Some(scheduler) => {
                scheduler.shutdown().await;
                true
            }
            None => false,
        };
        if restart {
            state.scheduler = Some(SyncScheduler::start(orchestrator.clone())?);
        }
        state.orchestrator = Some(orchestrator);
        tracing::info!("Sync engine initialized");
        Ok(())
    }

    /// Runs the startup cycle and starts the timers, once.
    pub async fn begin_sync(&self) -> Result<SyncStart> {
        let mut state = self.state.lock().await;
        let Some(orchestrator) = state.orchestrator.clone() else {
            return Ok(SyncStart::NotInitialized);
        };
        if state.scheduler.as_ref().is_some_and(SyncScheduler::is_running) {
            return Ok(SyncStart::AlreadyRunning);
        }
        state.scheduler = Some(SyncScheduler::start(orchestrator)?);
        Ok(SyncStart::Started)
    }

    pub async fn orchestrator(&self) -> Option<Arc<SyncOrchestrator>> {
        self.state.lock().await.orchestrator.clone()
    }

    pub async fn is_syncing(&self) -> bool {
        self.state
            .lock()
            .await
            .scheduler
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    pub async fn shutdown(&self) {
        let scheduler = self.state.lock().await.scheduler.take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
    }
}
