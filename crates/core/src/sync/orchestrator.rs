//! Holdings and price-only sync cycles.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fintech_market_data::{AssetType, CreditsInfo, ForexPair, PriceClass};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::registry::ProviderRegistry;
use super::symbol_issues::SymbolIssues;
use crate::config::{FintechConfig, BASE_CURRENCY};
use crate::errors::Result;
use crate::events::{PortfolioEvent, PortfolioEventSink};
use crate::history::{ChartData, ChartPeriod, HistoryRecorder, HistoryStats};
use crate::manual::{ManualHoldingsFile, ManualHoldingsSource};
use crate::market_hours::{CycleGate, MarketCalendar};
use crate::portfolio::{
    apply_quote, clear_price, compute_totals, merge_holdings, revalue, sort_positions,
    with_inverses, ForexRate, Position, StatusBanner,
};
use crate::snapshot::{PortfolioSnapshot, SnapshotStore};

/// A snapshot older than this is refreshed on startup.
const MAX_SNAPSHOT_AGE_HOURS: i64 = 24;

/// File locations used by the orchestrator.
#[derive(Clone, Debug)]
pub struct SyncPaths {
    pub snapshot: PathBuf,
    pub history: PathBuf,
    pub manual_holdings: PathBuf,
}

impl SyncPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            snapshot: dir.join("cache.json"),
            history: dir.join("history.json"),
            manual_holdings: dir.join("manual-holdings.json"),
        }
    }
}

/// State shared by every cycle. Held for the whole cycle so cycles never
/// interleave.
struct SyncState {
    snapshot: Option<PortfolioSnapshot>,
    issues: SymbolIssues,
    recorder: HistoryRecorder,
    last_error: Option<String>,
    /// Asset types whose market-closed skip was already logged at info
    closed_notified: HashSet<AssetType>,
}

/// Drives the holdings sync and the per-class price cycles.
pub struct SyncOrchestrator {
    config: FintechConfig,
    registry: ProviderRegistry,
    calendar: MarketCalendar,
    snapshots: SnapshotStore,
    manual: ManualHoldingsSource,
    sink: Arc<dyn PortfolioEventSink>,
    state: Mutex<SyncState>,
}

impl SyncOrchestrator {
    /// Builds the orchestrator and loads persisted state.
    ///
    /// Fails on an invalid market-hours schedule. Unreadable snapshot or
    /// history files are ignored.
    pub fn new(
        config: FintechConfig,
        registry: ProviderRegistry,
        paths: SyncPaths,
        sink: Arc<dyn PortfolioEventSink>,
    ) -> Result<Self> {
        let calendar = MarketCalendar::new(&config.market_hours)?;
        let snapshots = SnapshotStore::new(paths.snapshot);
        let snapshot = snapshots.load();
        let issues = snapshot
            .as_ref()
            .map(|s| SymbolIssues::new(s.invalid_symbols.clone(), s.rate_limited_symbols.clone()))
            .unwrap_or_default();
        let recorder =
            HistoryRecorder::open(paths.history, config.history_retention, config.hourly_retention);

        info!(
            "Sync orchestrator ready with providers [{}]",
            registry.ids().join(", ")
        );

        Ok(Self {
            config,
            registry,
            calendar,
            snapshots,
            manual: ManualHoldingsSource::new(paths.manual_holdings),
            sink,
            state: Mutex::new(SyncState {
                snapshot,
                issues,
                recorder,
                last_error: None,
                closed_notified: HashSet::new(),
            }),
        })
    }

    pub fn config(&self) -> &FintechConfig {
        &self.config
    }

    /// Credit usage reported by metered providers.
    pub fn provider_credits(&self) -> BTreeMap<&'static str, CreditsInfo> {
        self.registry.credits()
    }

    pub async fn snapshot(&self) -> Option<PortfolioSnapshot> {
        self.state.lock().await.snapshot.clone()
    }

    pub async fn chart_data(&self, period: ChartPeriod) -> ChartData {
        self.state.lock().await.recorder.chart_data(period)
    }

    pub async fn history_stats(&self) -> HistoryStats {
        self.state.lock().await.recorder.stats()
    }

    pub async fn issues(&self) -> SymbolIssues {
        self.state.lock().await.issues.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// Banner for the current snapshot; an absent snapshot counts as never synced.
    pub async fn status_at(&self, now: DateTime<Utc>) -> Option<StatusBanner> {
        let state = self.state.lock().await;
        let mut snapshot = state.snapshot.clone().unwrap_or_default();
        snapshot.has_error |= state.last_error.is_some();
        StatusBanner::evaluate(&snapshot, &self.config, now)
    }

    /// Whether startup should run a full holdings sync.
    ///
    /// True when there is no snapshot, it has no timestamp, it is older than
    /// a day, or the manual holdings file changed since it was written.
    pub async fn needs_holdings_sync(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().await;
        let Some(snapshot) = state.snapshot.as_ref() else {
            info!("No cached snapshot, holdings sync required");
            return true;
        };
        let Some(last_updated) = snapshot.last_updated else {
            info!("Cached snapshot has no timestamp, holdings sync required");
            return true;
        };
        if now - last_updated > Duration::hours(MAX_SNAPSHOT_AGE_HOURS) {
            info!("Cached snapshot from {} is stale, holdings sync required", last_updated);
            return true;
        }
        let mod_time = self.manual_mod_time();
        if mod_time != snapshot.manual_holdings_mod_time {
            info!("Manual holdings changed, holdings sync required");
            return true;
        }
        false
    }

    /// Re-broadcasts the cached snapshot and chart, if there is one.
    pub async fn publish_current(&self) {
        let state = self.state.lock().await;
        if let Some(snapshot) = state.snapshot.clone() {
            let data = state.recorder.chart_data(self.config.chart_period);
            self.sink.emit_batch(vec![
                PortfolioEvent::snapshot_updated(snapshot),
                PortfolioEvent::history_updated(self.config.chart_period, data),
            ]);
        }
    }

    /// Full holdings sync; failures are recorded and broadcast, never returned.
    pub async fn run_holdings_sync(&self) {
        if let Err(e) = self.sync_holdings().await {
            self.record_failure(format!("Holdings sync failed: {}", e)).await;
        }
    }

    /// Price-only cycle for one class; failures are recorded and broadcast.
    pub async fn run_price_sync(&self, class: PriceClass) {
        if let Err(e) = self.sync_prices(class).await {
            self.record_failure(format!("{} price update failed: {}", class, e)).await;
        }
    }

    pub async fn sync_holdings(&self) -> Result<PortfolioSnapshot> {
        self.sync_holdings_at(Utc::now()).await
    }

    /// Fetches, merges and prices all holdings, then persists and broadcasts.
    pub async fn sync_holdings_at(&self, now: DateTime<Utc>) -> Result<PortfolioSnapshot> {
        let mut state = self.state.lock().await;
        info!("Starting holdings sync");
        state.issues.reset();

        let conversion_rate = self.fetch_conversion_rate().await;

        let mut raw = Vec::new();
        for provider in self.registry.holdings_providers() {
            match provider.fetch_holdings().await {
                Ok(holdings) => {
                    info!("{} returned {} holdings", provider.id(), holdings.len());
                    raw.extend(holdings);
                }
                Err(e) => warn!("Holdings fetch from {} failed: {}", provider.id(), e),
            }
        }

        let manual = self.load_manual();
        let manual_mod_time = self.manual_mod_time();
        raw.extend(manual.raw_holdings());

        let mut holdings = merge_holdings(raw);
        holdings.retain(|p| !p.quantity.is_zero());
        info!("Merged into {} positions", holdings.len());

        for position in holdings.iter_mut() {
            convert_cost(position, conversion_rate);
            self.price_position(position, conversion_rate, &mut state.issues).await;
        }

        let forex = self.fetch_forex(&manual.forex_pairs(), &[]).await;

        sort_positions(&mut holdings, self.config.sort_by);
        let totals = compute_totals(&holdings);

        let mut snapshot = PortfolioSnapshot {
            holdings,
            forex,
            conversion_rate,
            currency: self.config.currency.clone(),
            last_updated: Some(now),
            last_price_update: Some(now),
            last_crypto_price_update: Some(now),
            last_stock_price_update: Some(now),
            manual_holdings_mod_time: manual_mod_time,
            ..PortfolioSnapshot::default()
        };
        snapshot.apply_totals(&totals);

        self.finish_cycle(&mut state, snapshot, now, true)
    }

    pub async fn sync_prices(&self, class: PriceClass) -> Result<Option<PortfolioSnapshot>> {
        self.sync_prices_at(class, Utc::now()).await
    }

    /// Refreshes prices for one class in the cached snapshot.
    ///
    /// Positions whose market is closed are skipped; a failed fetch keeps the
    /// previous price and still lands in the persisted issue lists. Returns
    /// `None` when no fetch was attempted. The price timestamps only move when
    /// at least one price or rate was refreshed.
    pub async fn sync_prices_at(
        &self,
        class: PriceClass,
        now: DateTime<Utc>,
    ) -> Result<Option<PortfolioSnapshot>> {
        let mut state = self.state.lock().await;
        let Some(mut snapshot) = state.snapshot.clone() else {
            debug!("No snapshot yet, skipping {} price update", class);
            return Ok(None);
        };

        let mut gate = self.calendar.begin_cycle(now);
        let rate = snapshot.conversion_rate;
        let mut attempted = 0usize;
        let mut refreshed = 0usize;

        for position in snapshot.holdings.iter_mut() {
            if !class.includes(position.asset_type) {
                continue;
            }
            if !self.gate_allows(&mut gate, &mut state, position.asset_type) {
                continue;
            }
            let Some(provider) = self.registry.pricing_provider_for(position.asset_type) else {
                continue;
            };
            attempted += 1;
            match provider.fetch_price(&position.symbol).await {
                Ok(quote) => {
                    apply_quote(position, &quote, rate);
                    refreshed += 1;
                }
                Err(e) => {
                    state.issues.record(&position.symbol, &e);
                    warn!("Price update for {} failed, keeping previous: {}", position.symbol, e);
                }
            }
        }

        if class == PriceClass::Traditional
            && !snapshot.forex.is_empty()
            && self.gate_allows(&mut gate, &mut state, AssetType::Forex)
        {
            let pairs: Vec<ForexPair> = snapshot
                .forex
                .iter()
                .filter(|r| !r.is_inverse)
                .filter_map(|r| r.pair.parse().ok())
                .collect();
            attempted += pairs.len();
            let forex = self.fetch_forex(&pairs, &snapshot.forex).await;
            refreshed += forex.iter().filter(|r| !r.is_inverse && !r.error).count();
            snapshot.forex = forex;
        }

        if attempted == 0 {
            debug!("No {} prices to refresh", class);
            return Ok(None);
        }
        info!("Refreshed {} of {} {} prices", refreshed, attempted, class);

        sort_positions(&mut snapshot.holdings, self.config.sort_by);
        let totals = compute_totals(&snapshot.holdings);
        snapshot.apply_totals(&totals);
        if refreshed > 0 {
            snapshot.last_price_update = Some(now);
            match class {
                PriceClass::Crypto => snapshot.last_crypto_price_update = Some(now),
                PriceClass::Traditional => snapshot.last_stock_price_update = Some(now),
            }
        }

        self.finish_cycle(&mut state, snapshot, now, false).map(Some)
    }

    /// Persists the snapshot, appends history and broadcasts.
    ///
    /// The error flag from a failed cycle is carried by this broadcast only.
    fn finish_cycle(
        &self,
        state: &mut SyncState,
        mut snapshot: PortfolioSnapshot,
        now: DateTime<Utc>,
        daily: bool,
    ) -> Result<PortfolioSnapshot> {
        snapshot.has_error = state.last_error.is_some();
        snapshot.invalid_symbols = state.issues.invalid_symbols().to_vec();
        snapshot.rate_limited_symbols = state.issues.rate_limited_symbols().to_vec();

        self.snapshots.save(&snapshot)?;
        state.last_error = None;

        let totals = compute_totals(&snapshot.holdings);
        if let Err(e) = state.recorder.add_hourly_snapshot_at(&totals, now) {
            warn!("Failed to record hourly history: {}", e);
        }
        if daily {
            if let Err(e) = state.recorder.add_daily_snapshot_at(&totals, &snapshot.holdings, now) {
                warn!("Failed to record daily history: {}", e);
            }
        }

        state.snapshot = Some(snapshot.clone());
        let data = state.recorder.chart_data_at(self.config.chart_period, now);
        self.sink.emit_batch(vec![
            PortfolioEvent::snapshot_updated(snapshot.clone()),
            PortfolioEvent::history_updated(self.config.chart_period, data),
        ]);

        Ok(snapshot)
    }

    async fn record_failure(&self, message: String) {
        error!("{}", message);
        let mut state = self.state.lock().await;
        state.last_error = Some(message.clone());
        self.sink.emit(PortfolioEvent::error(message));
    }

    /// Consults the cycle gate, logging a closed market once at info level
    /// and at debug level on later cycles until it reopens.
    fn gate_allows(&self, gate: &mut CycleGate<'_>, state: &mut SyncState, asset_type: AssetType) -> bool {
        if gate.allows(asset_type) {
            state.closed_notified.remove(&asset_type);
            return true;
        }
        if state.closed_notified.insert(asset_type) {
            info!("Market closed for {}, skipping price updates", asset_type);
        } else {
            debug!("Market still closed for {}", asset_type);
        }
        false
    }

    /// Rate from the base currency into the display currency; 1 on failure.
    async fn fetch_conversion_rate(&self) -> Decimal {
        if !self.config.needs_conversion() {
            return Decimal::ONE;
        }
        let pair = ForexPair::new(BASE_CURRENCY, self.config.currency.clone());
        let Some(provider) = self.registry.forex_provider() else {
            warn!("No forex provider for {}, using rate 1", pair);
            return Decimal::ONE;
        };
        match provider.fetch_forex_rate(&pair).await {
            Ok(quote) if quote.rate > Decimal::ZERO => {
                info!("Conversion rate {}: {}", pair, quote.rate);
                quote.rate
            }
            Ok(quote) => {
                warn!("Ignoring non-positive conversion rate {} for {}", quote.rate, pair);
                Decimal::ONE
            }
            Err(e) => {
                warn!("Conversion rate {} unavailable, using 1: {}", pair, e);
                Decimal::ONE
            }
        }
    }

    /// Prices one position during a holdings sync. Cash is priced at the
    /// conversion rate; a failed fetch leaves the position at zero.
    async fn price_position(&self, position: &mut Position, rate: Decimal, issues: &mut SymbolIssues) {
        if position.asset_type == AssetType::Cash {
            position.price = rate;
            position.change_24h = Decimal::ZERO;
            revalue(position);
            return;
        }
        let Some(provider) = self.registry.pricing_provider_for(position.asset_type) else {
            warn!("No pricing provider for {} ({})", position.symbol, position.asset_type);
            clear_price(position);
            return;
        };
        match provider.fetch_price(&position.symbol).await {
            Ok(quote) => apply_quote(position, &quote, rate),
            Err(e) => {
                issues.record(&position.symbol, &e);
                warn!("Price fetch for {} failed: {}", position.symbol, e);
                clear_price(position);
            }
        }
    }

    /// Fetches each pair and appends inverses.
    ///
    /// On failure the matching entry in `previous` is kept, or the pair is
    /// marked as failed when there is none.
    async fn fetch_forex(&self, pairs: &[ForexPair], previous: &[ForexRate]) -> Vec<ForexRate> {
        if pairs.is_empty() {
            return Vec::new();
        }
        let Some(provider) = self.registry.forex_provider() else {
            warn!("No forex provider for {} configured pairs", pairs.len());
            return previous.to_vec();
        };

        let mut rates = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match provider.fetch_forex_rate(pair).await {
                Ok(quote) => rates.push(ForexRate::from_quote(pair, &quote)),
                Err(e) => {
                    warn!("Forex rate {} failed: {}", pair, e);
                    let name = pair.to_string();
                    let kept = previous.iter().find(|r| !r.is_inverse && r.pair == name);
                    rates.push(kept.cloned().unwrap_or_else(|| ForexRate::failed(pair)));
                }
            }
        }
        with_inverses(rates)
    }

    fn load_manual(&self) -> ManualHoldingsFile {
        self.manual.load().unwrap_or_else(|e| {
            warn!(
                "Ignoring unreadable manual holdings {}: {}",
                self.manual.path().display(),
                e
            );
            ManualHoldingsFile::default()
        })
    }

    fn manual_mod_time(&self) -> Option<i64> {
        self.manual.modified_ms().unwrap_or_else(|e| {
            warn!("Cannot stat manual holdings: {}", e);
            None
        })
    }
}

/// Expresses cost figures in the display currency.
fn convert_cost(position: &mut Position, rate: Decimal) {
    if rate == Decimal::ONE {
        return;
    }
    position.cost_basis *= rate;
    position.open_pnl *= rate;
    position.avg_purchase_price = position.avg_purchase_price.map(|p| p * rate);
}
