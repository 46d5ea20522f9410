use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::model::{
    hour_bucket, ChartData, ChartPeriod, DailyHolding, DailySnapshot, HistoryStats,
    HourlySnapshot, PortfolioHistory,
};
use crate::errors::Result;
use crate::portfolio::{PortfolioTotals, Position};
use crate::utils::fs_utils::{read_json_optional, write_json_atomic};

/// Hourly points required before the one-month chart switches from daily.
const MIN_HOURLY_POINTS_FOR_MONTH: usize = 48;

/// Time-series store with hourly and daily granularity.
///
/// Both series are upserted by bucket and pruned after every write. The
/// whole history is kept in memory and rewritten atomically on each change.
#[derive(Debug)]
pub struct HistoryRecorder {
    path: PathBuf,
    retention_days: u32,
    hourly_retention_hours: u32,
    data: PortfolioHistory,
}

impl HistoryRecorder {
    /// Loads the history file. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>, retention_days: u32, hourly_retention_hours: u32) -> Self {
        let path = path.into();
        let data = match read_json_optional::<PortfolioHistory>(&path) {
            Ok(Some(data)) => {
                info!(
                    "Loaded history: {} hourly, {} daily snapshots",
                    data.hourly.len(),
                    data.daily.len()
                );
                data
            }
            Ok(None) => PortfolioHistory::default(),
            Err(e) => {
                warn!("Error loading history from {}, starting fresh: {}", path.display(), e);
                PortfolioHistory::default()
            }
        };

        Self {
            path,
            retention_days,
            hourly_retention_hours,
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history(&self) -> &PortfolioHistory {
        &self.data
    }

    pub fn add_hourly_snapshot(&mut self, totals: &PortfolioTotals) -> Result<()> {
        self.add_hourly_snapshot_at(totals, Utc::now())
    }

    /// Overwrites the latest point when it falls in the same hour, else appends.
    pub fn add_hourly_snapshot_at(&mut self, totals: &PortfolioTotals, now: DateTime<Utc>) -> Result<()> {
        let snapshot = HourlySnapshot {
            timestamp: now,
            total_value: totals.total_value,
            crypto_value: totals.crypto_value,
            traditional_value: totals.traditional_value,
        };

        match self.data.hourly.last_mut() {
            Some(last) if last.bucket() == hour_bucket(now) => *last = snapshot,
            _ => {
                self.data.hourly.push(snapshot);
                debug!("Added hourly snapshot: {}", totals.total_value.round_dp(2));
            }
        }

        self.prune_at(now);
        self.save()
    }

    pub fn add_daily_snapshot(&mut self, totals: &PortfolioTotals, holdings: &[Position]) -> Result<()> {
        self.add_daily_snapshot_at(totals, holdings, Utc::now())
    }

    /// Replaces the entry for today's UTC date, or inserts it in date order.
    pub fn add_daily_snapshot_at(
        &mut self,
        totals: &PortfolioTotals,
        holdings: &[Position],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let date = now.date_naive();
        let snapshot = DailySnapshot {
            date,
            total_value: totals.total_value,
            crypto_value: totals.crypto_value,
            traditional_value: totals.traditional_value,
            holdings: holdings
                .iter()
                .map(|p| {
                    (
                        p.symbol.clone(),
                        DailyHolding {
                            quantity: p.quantity,
                            price: p.price,
                            value: p.value,
                            asset_type: p.asset_type,
                        },
                    )
                })
                .collect(),
        };

        match self.data.daily.iter_mut().find(|d| d.date == date) {
            Some(existing) => *existing = snapshot,
            None => {
                self.data.daily.push(snapshot);
                self.data.daily.sort_by_key(|d| d.date);
            }
        }

        info!("Recorded daily snapshot for {}: {}", date, totals.total_value.round_dp(2));
        self.prune_at(now);
        self.save()
    }

    /// Drops hourly points older than the hourly retention and daily points
    /// older than the daily retention. Returns how many were removed.
    pub fn prune_at(&mut self, now: DateTime<Utc>) -> usize {
        let hourly_cutoff = now - Duration::hours(i64::from(self.hourly_retention_hours));
        let before = self.data.hourly.len();
        self.data.hourly.retain(|s| s.timestamp >= hourly_cutoff);
        let hourly_pruned = before - self.data.hourly.len();
        if hourly_pruned > 0 {
            info!(
                "Pruned {} hourly snapshots older than {} hours",
                hourly_pruned, self.hourly_retention_hours
            );
        }

        let daily_cutoff = daily_cutoff(now, self.retention_days);
        let before = self.data.daily.len();
        self.data.daily.retain(|s| s.date >= daily_cutoff);
        let daily_pruned = before - self.data.daily.len();
        if daily_pruned > 0 {
            info!(
                "Pruned {} daily snapshots older than {} days",
                daily_pruned, self.retention_days
            );
        }

        hourly_pruned + daily_pruned
    }

    /// Hourly points within the last `hours`, or all of them.
    pub fn hourly_data(&self, hours: Option<u32>, now: DateTime<Utc>) -> Vec<HourlySnapshot> {
        match hours {
            Some(hours) => {
                let cutoff = now - Duration::hours(i64::from(hours));
                self.data
                    .hourly
                    .iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .cloned()
                    .collect()
            }
            None => self.data.hourly.clone(),
        }
    }

    /// Daily points within the last `days`, or all of them.
    pub fn daily_data(&self, days: Option<u32>, now: DateTime<Utc>) -> Vec<DailySnapshot> {
        match days {
            Some(days) => {
                let cutoff = daily_cutoff(now, days);
                self.data
                    .daily
                    .iter()
                    .filter(|s| s.date >= cutoff)
                    .cloned()
                    .collect()
            }
            None => self.data.daily.clone(),
        }
    }

    pub fn chart_data(&self, period: ChartPeriod) -> ChartData {
        self.chart_data_at(period, Utc::now())
    }

    /// Points for one chart period, never mixing granularities.
    ///
    /// The one-month view uses hourly points once at least 48 exist in the
    /// last 720 hours and falls back to 30 daily points before that.
    pub fn chart_data_at(&self, period: ChartPeriod, now: DateTime<Utc>) -> ChartData {
        match period {
            ChartPeriod::OneDay => ChartData::Hourly(self.hourly_data(Some(24), now)),
            ChartPeriod::OneWeek => ChartData::Hourly(self.hourly_data(Some(168), now)),
            ChartPeriod::OneMonth => {
                let hourly = self.hourly_data(Some(720), now);
                if hourly.len() >= MIN_HOURLY_POINTS_FOR_MONTH {
                    ChartData::Hourly(hourly)
                } else {
                    ChartData::Daily(self.daily_data(Some(30), now))
                }
            }
            ChartPeriod::ThreeMonths => ChartData::Daily(self.daily_data(Some(90), now)),
            ChartPeriod::OneYear => ChartData::Daily(self.daily_data(Some(365), now)),
            ChartPeriod::All => ChartData::Daily(self.daily_data(None, now)),
        }
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            hourly_count: self.data.hourly.len(),
            daily_count: self.data.daily.len(),
            oldest_daily: self.data.daily.first().map(|d| d.date),
            newest_daily: self.data.daily.last().map(|d| d.date),
            oldest_hourly: self.data.hourly.first().map(|h| h.timestamp),
            newest_hourly: self.data.hourly.last().map(|h| h.timestamp),
        }
    }

    fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.data)
    }
}

fn daily_cutoff(now: DateTime<Utc>, days: u32) -> NaiveDate {
    (now - Duration::days(i64::from(days))).date_naive()
}

/// Totals as stored in history; kept separate so callers can pass zeros.
pub fn totals_of(total_value: Decimal, crypto_value: Decimal, traditional_value: Decimal) -> PortfolioTotals {
    PortfolioTotals {
        total_value,
        crypto_value,
        traditional_value,
        ..PortfolioTotals::default()
    }
}
