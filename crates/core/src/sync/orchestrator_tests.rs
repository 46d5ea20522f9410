use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fintech_market_data::{
    AssetType, ErrorCode, ForexPair, ForexQuote, PortfolioProvider, PriceClass, PriceQuote,
    ProviderCapabilities, ProviderError, ProviderKind, RawHolding,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use super::orchestrator::{SyncOrchestrator, SyncPaths};
use super::registry::ProviderRegistry;
use crate::config::FintechConfig;
use crate::events::MockEventSink;
use crate::market_hours::MarketSchedule;
use crate::snapshot::PortfolioSnapshot;

// ── Mock provider ───────────────────────────────────────────────────────

struct MockProvider {
    id: &'static str,
    kind: ProviderKind,
    caps: ProviderCapabilities,
    holdings: Mutex<Result<Vec<RawHolding>, ProviderError>>,
    prices: Mutex<HashMap<String, Result<PriceQuote, ProviderError>>>,
    forex: Mutex<HashMap<String, Result<ForexQuote, ProviderError>>>,
    price_calls: AtomicUsize,
}

impl MockProvider {
    fn new(id: &'static str, kind: ProviderKind, caps: ProviderCapabilities) -> Self {
        Self {
            id,
            kind,
            caps,
            holdings: Mutex::new(Ok(Vec::new())),
            prices: Mutex::new(HashMap::new()),
            forex: Mutex::new(HashMap::new()),
            price_calls: AtomicUsize::new(0),
        }
    }

    fn set_holdings(&self, result: Result<Vec<RawHolding>, ProviderError>) {
        *self.holdings.lock().unwrap() = result;
    }

    fn set_price(&self, symbol: &str, result: Result<PriceQuote, ProviderError>) {
        self.prices.lock().unwrap().insert(symbol.to_string(), result);
    }

    fn set_forex(&self, pair: &str, result: Result<ForexQuote, ProviderError>) {
        self.forex.lock().unwrap().insert(pair.to_string(), result);
    }

    fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortfolioProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.caps.clone()
    }

    async fn fetch_holdings(&self) -> Result<Vec<RawHolding>, ProviderError> {
        self.holdings.lock().unwrap().clone()
    }

    async fn fetch_price(&self, symbol: &str) -> Result<PriceQuote, ProviderError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::invalid_symbol(self.id, symbol)))
    }

    async fn fetch_forex_rate(&self, pair: &ForexPair) -> Result<ForexQuote, ProviderError> {
        self.forex
            .lock()
            .unwrap()
            .get(&pair.to_string())
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::invalid_symbol(self.id, &pair.to_string())))
    }
}

// ── Fixture ─────────────────────────────────────────────────────────────

struct Fixture {
    dir: tempfile::TempDir,
    exchange: Arc<MockProvider>,
    aggregator: Arc<MockProvider>,
    quotes: Arc<MockProvider>,
    sink: MockEventSink,
}

impl Fixture {
    fn new() -> Self {
        let exchange = Arc::new(MockProvider::new(
            "EXCHANGE",
            ProviderKind::CryptoExchange,
            ProviderCapabilities {
                asset_types: &[AssetType::Crypto],
                supports_holdings: true,
                supports_pricing: true,
                supports_forex: false,
            },
        ));
        exchange.set_holdings(Ok(vec![
            RawHolding::new("BTC", AssetType::Crypto, dec!(0.5), "coinbase-api"),
            RawHolding::new("ETH", AssetType::Crypto, dec!(0), "coinbase-api"),
        ]));
        exchange.set_price("BTC", Ok(PriceQuote::new(dec!(60000), dec!(2))));

        let aggregator = Arc::new(MockProvider::new(
            "AGGREGATOR",
            ProviderKind::BrokerageAggregator,
            ProviderCapabilities {
                asset_types: &[AssetType::Stock, AssetType::Etf, AssetType::Crypto],
                supports_holdings: true,
                supports_pricing: false,
                supports_forex: false,
            },
        ));
        aggregator.set_holdings(Ok(vec![
            RawHolding::new("AAPL", AssetType::Stock, dec!(10), "snaptrade")
                .with_cost_basis(dec!(1500)),
            RawHolding::new("ZZZZ", AssetType::Stock, dec!(1), "snaptrade"),
        ]));

        let quotes = Arc::new(MockProvider::new(
            "QUOTES",
            ProviderKind::QuoteApi,
            ProviderCapabilities {
                asset_types: &[AssetType::Stock, AssetType::Etf, AssetType::Forex],
                supports_holdings: false,
                supports_pricing: true,
                supports_forex: true,
            },
        ));
        quotes.set_price("AAPL", Ok(PriceQuote::new(dec!(180), dec!(-1))));
        quotes.set_forex("EUR/USD", Ok(forex_quote(dec!(1.08), dec!(0.5))));

        let dir = tempfile::tempdir().unwrap();
        write_manual(
            dir.path(),
            json!({
                "holdings": [
                    {"symbol": "BTC", "quantity": 0.5, "type": "crypto", "costBasis": 10000},
                    {"symbol": "USD", "quantity": 1000, "type": "cash"}
                ],
                "forex": [{"pair": "EUR/USD"}]
            }),
        );

        Self {
            dir,
            exchange,
            aggregator,
            quotes,
            sink: MockEventSink::new(),
        }
    }

    fn paths(&self) -> SyncPaths {
        SyncPaths::in_dir(self.dir.path())
    }

    fn orchestrator(&self) -> SyncOrchestrator {
        self.orchestrator_with(FintechConfig::default())
    }

    fn orchestrator_with(&self, config: FintechConfig) -> SyncOrchestrator {
        let providers: Vec<Arc<dyn PortfolioProvider>> = vec![
            self.exchange.clone(),
            self.aggregator.clone(),
            self.quotes.clone(),
        ];
        SyncOrchestrator::new(
            config,
            ProviderRegistry::new(providers),
            self.paths(),
            Arc::new(self.sink.clone()),
        )
        .unwrap()
    }
}

fn forex_quote(rate: Decimal, change: Decimal) -> ForexQuote {
    ForexQuote {
        rate,
        change_24h: change,
        timestamp: Utc::now(),
    }
}

fn write_manual(dir: &Path, content: serde_json::Value) {
    std::fs::write(dir.join("manual-holdings.json"), content.to_string()).unwrap();
}

/// Monday 2024-03-04 10:00 in New York (EST).
fn monday_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
}

fn position<'a>(snapshot: &'a PortfolioSnapshot, symbol: &str) -> &'a crate::portfolio::Position {
    snapshot
        .holdings
        .iter()
        .find(|p| p.symbol == symbol)
        .unwrap()
}

// ── Holdings sync ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_holdings_sync_merges_prices_and_persists() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let now = monday_open();

    let snapshot = orchestrator.sync_holdings_at(now).await.unwrap();

    let symbols: Vec<&str> = snapshot.holdings.iter().map(|p| p.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTC", "AAPL", "USD", "ZZZZ"]);

    let btc = position(&snapshot, "BTC");
    assert_eq!(btc.quantity, dec!(1));
    assert_eq!(btc.value, dec!(60000));
    assert_eq!(btc.sources, vec!["coinbase-api", "manual"]);

    let aapl = position(&snapshot, "AAPL");
    assert_eq!(aapl.value, dec!(1800));
    assert_eq!(aapl.gain_loss_percent, Some(dec!(20)));

    let cash = position(&snapshot, "USD");
    assert_eq!(cash.price, dec!(1));
    assert_eq!(cash.value, dec!(1000));

    let bad = position(&snapshot, "ZZZZ");
    assert_eq!(bad.price, dec!(0));
    assert_eq!(bad.gain_loss_percent, None);

    assert_eq!(snapshot.total_value, dec!(62800));
    assert!(snapshot.total_gain_loss_percent.is_some());
    assert_eq!(snapshot.invalid_symbols, vec!["ZZZZ"]);
    assert!(snapshot.rate_limited_symbols.is_empty());
    assert_eq!(snapshot.last_updated, Some(now));
    assert!(!snapshot.has_error);

    let pairs: Vec<&str> = snapshot.forex.iter().map(|r| r.pair.as_str()).collect();
    assert_eq!(pairs, vec!["EUR/USD", "USD/EUR"]);
    assert_eq!(snapshot.forex[1].change_24h, dec!(-0.5));

    // Persisted and broadcast
    let reloaded: PortfolioSnapshot =
        serde_json::from_str(&std::fs::read_to_string(fx.paths().snapshot).unwrap()).unwrap();
    assert_eq!(reloaded.holdings.len(), 4);
    assert_eq!(fx.sink.names(), vec!["snapshot-updated", "history-updated"]);

    let stats = orchestrator.history_stats().await;
    assert_eq!(stats.hourly_count, 1);
    assert_eq!(stats.daily_count, 1);
}

#[tokio::test]
async fn test_failed_provider_does_not_block_others() {
    let fx = Fixture::new();
    fx.aggregator.set_holdings(Err(ProviderError::new(
        "AGGREGATOR",
        ErrorCode::AuthError,
        false,
        "401 unauthorized",
    )));
    let orchestrator = fx.orchestrator();

    let snapshot = orchestrator.sync_holdings_at(monday_open()).await.unwrap();
    let symbols: Vec<&str> = snapshot.holdings.iter().map(|p| p.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTC", "USD"]);
    assert!(!fx.sink.names().contains(&"error"));
}

#[tokio::test]
async fn test_display_currency_conversion() {
    let fx = Fixture::new();
    fx.quotes.set_forex("USD/EUR", Ok(forex_quote(dec!(0.9), dec!(0))));
    let config = FintechConfig::from_json(json!({"currency": "eur"})).unwrap();
    let orchestrator = fx.orchestrator_with(config);

    let snapshot = orchestrator.sync_holdings_at(monday_open()).await.unwrap();
    assert_eq!(snapshot.conversion_rate, dec!(0.9));
    assert_eq!(snapshot.currency, "EUR");

    let aapl = position(&snapshot, "AAPL");
    assert_eq!(aapl.price, dec!(162));
    assert_eq!(aapl.cost_basis, dec!(1350));
    assert_eq!(position(&snapshot, "USD").price, dec!(0.9));
}

#[tokio::test]
async fn test_conversion_rate_defaults_to_one_on_failure() {
    let fx = Fixture::new();
    let config = FintechConfig::from_json(json!({"currency": "GBP"})).unwrap();
    let orchestrator = fx.orchestrator_with(config);

    let snapshot = orchestrator.sync_holdings_at(monday_open()).await.unwrap();
    assert_eq!(snapshot.conversion_rate, dec!(1));
    assert_eq!(position(&snapshot, "AAPL").price, dec!(180));
}

// ── Price-only cycles ───────────────────────────────────────────────────

#[tokio::test]
async fn test_price_cycle_retains_issues_and_previous_prices() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let t0 = monday_open();
    orchestrator.sync_holdings_at(t0).await.unwrap();

    fx.quotes.set_price(
        "AAPL",
        Err(ProviderError::rate_limited("QUOTES", "AAPL")),
    );
    fx.quotes.set_price("ZZZZ", Ok(PriceQuote::new(dec!(5), dec!(0))));

    let t1 = t0 + Duration::minutes(20);
    let snapshot = orchestrator
        .sync_prices_at(PriceClass::Traditional, t1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(position(&snapshot, "AAPL").price, dec!(180));
    assert_eq!(position(&snapshot, "ZZZZ").value, dec!(5));
    // ZZZZ recovered but stays listed until the next full sync
    assert_eq!(snapshot.invalid_symbols, vec!["ZZZZ"]);
    assert_eq!(snapshot.rate_limited_symbols, vec!["AAPL"]);

    assert_eq!(snapshot.last_updated, Some(t0));
    assert_eq!(snapshot.last_stock_price_update, Some(t1));
    assert_eq!(snapshot.last_crypto_price_update, Some(t0));
    assert_eq!(snapshot.last_price_update, Some(t1));

    // Same hour: the hourly point is overwritten; no daily write
    let stats = orchestrator.history_stats().await;
    assert_eq!(stats.hourly_count, 1);
    assert_eq!(stats.daily_count, 1);

    // A repeat failure does not duplicate the entry
    let snapshot = orchestrator
        .sync_prices_at(PriceClass::Traditional, t1 + Duration::minutes(20))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.rate_limited_symbols, vec!["AAPL"]);

    // Full sync clears both lists
    fx.quotes.set_price("AAPL", Ok(PriceQuote::new(dec!(181), dec!(0))));
    let snapshot = orchestrator
        .sync_holdings_at(t1 + Duration::hours(2))
        .await
        .unwrap();
    assert!(snapshot.invalid_symbols.is_empty());
    assert!(snapshot.rate_limited_symbols.is_empty());
}

#[tokio::test]
async fn test_price_cycle_with_every_fetch_failing_still_publishes_issues() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let t0 = monday_open();
    orchestrator.sync_holdings_at(t0).await.unwrap();
    fx.sink.clear();

    fx.exchange.set_price("BTC", Err(ProviderError::rate_limited("EXCHANGE", "BTC")));
    let t1 = t0 + Duration::minutes(5);
    let snapshot = orchestrator
        .sync_prices_at(PriceClass::Crypto, t1)
        .await
        .unwrap()
        .expect("a cycle that attempted fetches is published");

    assert_eq!(snapshot.rate_limited_symbols, vec!["BTC"]);
    assert_eq!(position(&snapshot, "BTC").price, dec!(60000));
    // Nothing was refreshed, so the price timestamps stay put
    assert_eq!(snapshot.last_crypto_price_update, Some(t0));
    assert_eq!(snapshot.last_price_update, Some(t0));

    let persisted = crate::snapshot::SnapshotStore::new(fx.paths().snapshot)
        .load()
        .unwrap();
    assert_eq!(persisted.rate_limited_symbols, vec!["BTC"]);
    assert_eq!(fx.sink.names(), vec!["snapshot-updated", "history-updated"]);
}

#[tokio::test]
async fn test_closed_market_skips_traditional_but_not_crypto() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();
    orchestrator.sync_holdings_at(saturday).await.unwrap();
    let quote_calls = fx.quotes.price_calls();

    let result = orchestrator
        .sync_prices_at(PriceClass::Traditional, saturday + Duration::minutes(20))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(fx.quotes.price_calls(), quote_calls);

    fx.exchange.set_price("BTC", Ok(PriceQuote::new(dec!(61000), dec!(1))));
    let snapshot = orchestrator
        .sync_prices_at(PriceClass::Crypto, saturday + Duration::minutes(5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position(&snapshot, "BTC").value, dec!(61000));
    assert_eq!(snapshot.last_crypto_price_update, Some(saturday + Duration::minutes(5)));
}

#[tokio::test]
async fn test_post_close_poll_runs_once_per_day() {
    let fx = Fixture::new();
    // Forex trades through the evening; leave it out so only stocks are gated
    write_manual(fx.dir.path(), json!({"holdings": []}));
    let orchestrator = fx.orchestrator();
    orchestrator.sync_holdings_at(monday_open()).await.unwrap();

    // 16:05 and 16:10 in New York
    let after_close = Utc.with_ymd_and_hms(2024, 3, 4, 21, 5, 0).unwrap();
    let first = orchestrator
        .sync_prices_at(PriceClass::Traditional, after_close)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = orchestrator
        .sync_prices_at(PriceClass::Traditional, after_close + Duration::minutes(5))
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_failed_post_close_poll_is_not_retried() {
    let fx = Fixture::new();
    write_manual(fx.dir.path(), json!({"holdings": []}));
    let orchestrator = fx.orchestrator();
    orchestrator.sync_holdings_at(monday_open()).await.unwrap();

    fx.quotes.set_price(
        "AAPL",
        Err(ProviderError::rate_limited("QUOTES", "AAPL")),
    );
    let after_close = Utc.with_ymd_and_hms(2024, 3, 4, 21, 5, 0).unwrap();
    let first = orchestrator
        .sync_prices_at(PriceClass::Traditional, after_close)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.rate_limited_symbols, vec!["AAPL"]);
    let calls = fx.quotes.price_calls();

    fx.quotes.set_price("AAPL", Ok(PriceQuote::new(dec!(181), dec!(1))));
    let second = orchestrator
        .sync_prices_at(PriceClass::Traditional, after_close + Duration::minutes(5))
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(fx.quotes.price_calls(), calls);
}

#[tokio::test]
async fn test_price_cycle_without_snapshot_is_a_no_op() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let result = orchestrator
        .sync_prices_at(PriceClass::Crypto, monday_open())
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(fx.sink.is_empty());
}

// ── Startup and failure handling ────────────────────────────────────────

#[tokio::test]
async fn test_needs_holdings_sync() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let now = monday_open();
    assert!(orchestrator.needs_holdings_sync(now).await);

    orchestrator.sync_holdings_at(now).await.unwrap();
    assert!(!orchestrator.needs_holdings_sync(now + Duration::hours(1)).await);
    assert!(orchestrator.needs_holdings_sync(now + Duration::hours(25)).await);

    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(fx.paths().manual_holdings)
        .unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + StdDuration::from_secs(1_700_000_000))
        .unwrap();
    assert!(orchestrator.needs_holdings_sync(now + Duration::hours(1)).await);
}

#[tokio::test]
async fn test_restart_restores_snapshot_and_issues() {
    let fx = Fixture::new();
    let now = monday_open();
    fx.orchestrator().sync_holdings_at(now).await.unwrap();

    let restarted = fx.orchestrator();
    assert!(!restarted.needs_holdings_sync(now + Duration::hours(1)).await);
    assert_eq!(restarted.issues().await.invalid_symbols(), ["ZZZZ".to_string()]);
    assert_eq!(restarted.snapshot().await.unwrap().total_value, dec!(62800));
}

#[tokio::test]
async fn test_cycle_failure_flags_next_broadcast_only() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let snapshot_path = fx.paths().snapshot;
    std::fs::create_dir(&snapshot_path).unwrap();

    orchestrator.run_holdings_sync().await;
    assert_eq!(fx.sink.names(), vec!["error"]);
    assert!(orchestrator.last_error().await.is_some());
    assert!(orchestrator.snapshot().await.is_none());

    std::fs::remove_dir(&snapshot_path).unwrap();
    let flagged = orchestrator.sync_holdings_at(monday_open()).await.unwrap();
    assert!(flagged.has_error);
    assert!(orchestrator.last_error().await.is_none());

    let cleared = orchestrator
        .sync_holdings_at(monday_open() + Duration::hours(1))
        .await
        .unwrap();
    assert!(!cleared.has_error);
}

#[tokio::test]
async fn test_status_banner_reports_issues() {
    let fx = Fixture::new();
    let orchestrator = fx.orchestrator();
    let now = monday_open();
    assert!(orchestrator.status_at(now).await.is_some());

    orchestrator.sync_holdings_at(now).await.unwrap();
    let banner = orchestrator.status_at(now).await.unwrap();
    assert_eq!(banner.invalid_symbol_count, 1);
}

#[test]
fn test_invalid_market_hours_are_rejected() {
    let fx = Fixture::new();
    let mut config = FintechConfig::default();
    config.market_hours.insert(
        AssetType::Stock,
        MarketSchedule::equity("09:30", "16:00", false).with_timezone("Mars/Olympus"),
    );
    let result = SyncOrchestrator::new(
        config,
        ProviderRegistry::default(),
        fx.paths(),
        Arc::new(MockEventSink::new()),
    );
    assert!(result.is_err());
}
