use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FintechConfig;
use crate::snapshot::PortfolioSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// Summary of everything the display layer should warn about.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBanner {
    pub severity: Severity,
    pub invalid_symbol_count: usize,
    pub rate_limited_count: usize,
    pub holdings_stale: bool,
    pub prices_stale: bool,
    pub has_error: bool,
    pub messages: Vec<String>,
}

impl StatusBanner {
    /// `None` when there is nothing to report.
    ///
    /// Symbol issues and stale prices are warnings; an error flag or stale
    /// holdings are errors; holdings older than twice the threshold (or never
    /// synced) are critical.
    pub fn evaluate(
        snapshot: &PortfolioSnapshot,
        config: &FintechConfig,
        now: DateTime<Utc>,
    ) -> Option<StatusBanner> {
        let mut severity: Option<Severity> = None;
        let mut messages = Vec::new();
        let mut raise = |level: Severity, message: String| {
            severity = severity.max(Some(level));
            messages.push(message);
        };

        let invalid = snapshot.invalid_symbols.len();
        if invalid > 0 {
            raise(Severity::Warning, format!("{} invalid symbol(s): {}", invalid, snapshot.invalid_symbols.join(", ")));
        }
        let limited = snapshot.rate_limited_symbols.len();
        if limited > 0 {
            raise(Severity::Warning, format!("{} symbol(s) rate limited", limited));
        }

        let age_ms = |at: Option<DateTime<Utc>>| at.map(|t| (now - t).num_milliseconds().max(0) as u64);

        let prices_stale = age_ms(snapshot.last_price_update)
            .is_some_and(|age| age > config.stale_prices_threshold);
        if prices_stale {
            raise(Severity::Warning, "Prices are stale".to_string());
        }

        if snapshot.has_error {
            raise(Severity::Error, "Last sync failed".to_string());
        }

        let holdings_age = age_ms(snapshot.last_updated);
        let holdings_stale = holdings_age.map_or(true, |age| age > config.stale_holdings_threshold);
        match holdings_age {
            None => raise(Severity::Critical, "Holdings have never been synced".to_string()),
            Some(age) if age > config.stale_holdings_threshold.saturating_mul(2) => {
                raise(Severity::Critical, "Holdings are critically out of date".to_string())
            }
            Some(age) if age > config.stale_holdings_threshold => {
                raise(Severity::Error, "Holdings are out of date".to_string())
            }
            Some(_) => {}
        }

        severity.map(|severity| StatusBanner {
            severity,
            invalid_symbol_count: invalid,
            rate_limited_count: limited,
            holdings_stale,
            prices_stale,
            has_error: snapshot.has_error,
            messages,
        })
    }
}
