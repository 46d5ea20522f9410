//! Market calendar: decides whether each asset type may be re-priced now.

mod calendar;
mod schedule;

pub use calendar::{CycleGate, MarketCalendar, MarketState};
pub use schedule::{default_market_hours, MarketSchedule};
