use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use fintech_market_data::AssetType;
use log::{debug, warn};

use super::schedule::{CompiledSchedule, MarketSchedule, TradingWindow};
use crate::errors::Result;
use crate::utils::time_utils::minute_of_day;

/// Result of evaluating one asset type's trading window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketState {
    /// No schedule, a disabled schedule, or an asset type that never closes
    Unrestricted,
    Open,
    /// Closed, but this is the one post-close refresh for the day
    PostClose,
    Closed,
}

impl MarketState {
    pub fn allows_update(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Per-asset-type trading-window evaluator.
///
/// All wall-clock comparisons happen in each schedule's own timezone. The
/// only mutable state is the date of the last post-close poll per asset type.
#[derive(Debug)]
pub struct MarketCalendar {
    schedules: HashMap<AssetType, CompiledSchedule>,
    post_close_fired: Mutex<HashMap<AssetType, NaiveDate>>,
}

impl MarketCalendar {
    /// Builds the calendar, rejecting unknown timezones and malformed times.
    pub fn new(market_hours: &BTreeMap<AssetType, MarketSchedule>) -> Result<Self> {
        let mut schedules = HashMap::new();
        for (asset_type, schedule) in market_hours {
            if let Some(compiled) = schedule.compile(*asset_type)? {
                schedules.insert(*asset_type, compiled);
            }
        }
        Ok(Self {
            schedules,
            post_close_fired: Mutex::new(HashMap::new()),
        })
    }

    /// Whether a price refresh for `asset_type` is permitted right now.
    pub fn can_update_asset_type(&self, asset_type: AssetType) -> bool {
        self.can_update_asset_type_at(asset_type, Utc::now())
    }

    pub fn can_update_asset_type_at(&self, asset_type: AssetType, now: DateTime<Utc>) -> bool {
        self.evaluate(asset_type, now).allows_update()
    }

    /// Evaluates the window, consuming the day's post-close poll if it fires.
    ///
    /// The post-close poll is spent once granted. A fetch that then fails
    /// does not get a second one until the next trading date.
    pub fn evaluate(&self, asset_type: AssetType, now: DateTime<Utc>) -> MarketState {
        if matches!(asset_type, AssetType::Crypto | AssetType::Cash) {
            return MarketState::Unrestricted;
        }
        let Some(schedule) = self.schedules.get(&asset_type) else {
            return MarketState::Unrestricted;
        };

        let local = now.with_timezone(&schedule.tz);
        let weekday = local.weekday().num_days_from_sunday() as u8;
        let minutes = minute_of_day(&local);

        match &schedule.window {
            TradingWindow::Forex {
                sunday_open,
                friday_close,
            } => {
                let open = match weekday {
                    6 => false,
                    0 => minutes >= *sunday_open,
                    5 => minutes < *friday_close,
                    _ => true,
                };
                if open {
                    MarketState::Open
                } else {
                    MarketState::Closed
                }
            }
            TradingWindow::Equity {
                open,
                close,
                days,
                post_close_poll,
            } => {
                let trading_day = days.contains(&weekday);
                if trading_day && *open <= minutes && minutes < *close {
                    return MarketState::Open;
                }
                if *post_close_poll && trading_day && minutes >= *close {
                    let today = local.date_naive();
                    let mut fired = self.fired();
                    if fired.get(&asset_type) != Some(&today) {
                        fired.insert(asset_type, today);
                        debug!("Post-close poll for {} on {}", asset_type, today);
                        return MarketState::PostClose;
                    }
                }
                MarketState::Closed
            }
        }
    }

    /// Starts a price cycle whose gating decisions are fixed on first use.
    pub fn begin_cycle(&self, now: DateTime<Utc>) -> CycleGate<'_> {
        CycleGate {
            calendar: self,
            now,
            decisions: HashMap::new(),
        }
    }

    fn fired(&self) -> MutexGuard<'_, HashMap<AssetType, NaiveDate>> {
        self.post_close_fired.lock().unwrap_or_else(|poisoned| {
            warn!("Post-close poll tracker mutex was poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

/// Memoized gating for one update cycle.
///
/// Every symbol of an asset type sees the same decision, and a post-close
/// poll is consumed at most once per cycle.
pub struct CycleGate<'a> {
    calendar: &'a MarketCalendar,
    now: DateTime<Utc>,
    decisions: HashMap<AssetType, MarketState>,
}

impl CycleGate<'_> {
    pub fn state(&mut self, asset_type: AssetType) -> MarketState {
        let (calendar, now) = (self.calendar, self.now);
        *self
            .decisions
            .entry(asset_type)
            .or_insert_with(|| calendar.evaluate(asset_type, now))
    }

    pub fn allows(&mut self, asset_type: AssetType) -> bool {
        self.state(asset_type).allows_update()
    }
}
