//! Timers driving the sync cycles.
//!
//! One daily alarm for the holdings sync (host-local `HH:MM`) and one
//! interval per price class. Every task stops when the scheduler's
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use fintech_market_data::PriceClass;
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::orchestrator::SyncOrchestrator;
use crate::errors::Result;
use crate::utils::time_utils::duration_until_daily;

pub struct SyncScheduler {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Runs the startup cycle, then starts the timers.
    ///
    /// The startup cycle is a full holdings sync when the cached snapshot is
    /// missing, old, or older than the manual holdings file; otherwise the
    /// cached snapshot is re-broadcast.
    pub fn start(orchestrator: Arc<SyncOrchestrator>) -> Result<Self> {
        let config = orchestrator.config();
        let sync_minutes = config.holdings_sync_minutes()?;
        let crypto_every = config.crypto_interval();
        let stock_every = config.stock_interval();
        let token = CancellationToken::new();

        info!(
            "Starting sync scheduler: holdings daily at {}, crypto every {}s, stocks every {}s",
            config.holdings_sync_time,
            crypto_every.as_secs(),
            stock_every.as_secs()
        );

        let startup = {
            let orchestrator = orchestrator.clone();
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = run_startup(&orchestrator) => {}
                }
            })
        };

        let daily = {
            let orchestrator = orchestrator.clone();
            let token = token.clone();
            tokio::spawn(async move {
                loop {
                    let wait = duration_until_daily(&Local::now(), sync_minutes);
                    debug!("Next holdings sync in {}s", wait.as_secs());
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(wait) => {
                            info!("Running scheduled holdings sync");
                            orchestrator.run_holdings_sync().await;
                        }
                    }
                }
                debug!("Holdings sync timer stopped");
            })
        };

        let crypto = spawn_price_timer(orchestrator.clone(), PriceClass::Crypto, crypto_every, token.clone());
        let stock = spawn_price_timer(orchestrator, PriceClass::Traditional, stock_every, token.clone());

        Ok(Self {
            token,
            handles: vec![startup, daily, crypto, stock],
        })
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Cancels every timer and waits for in-flight cycles to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.await;
        }
        info!("Sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_startup(orchestrator: &SyncOrchestrator) {
    if orchestrator.needs_holdings_sync(chrono::Utc::now()).await {
        orchestrator.run_holdings_sync().await;
    } else {
        info!("Using cached snapshot");
        orchestrator.publish_current().await;
    }
}

/// First tick fires one period after start; late ticks are delayed, not bunched.
fn spawn_price_timer(
    orchestrator: Arc<SyncOrchestrator>,
    class: PriceClass,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => orchestrator.run_price_sync(class).await,
            }
        }
        debug!("{} price timer stopped", class);
    })
}
