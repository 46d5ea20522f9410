//! Portfolio value history at hourly and daily granularity.

mod model;
mod recorder;

pub use model::{
    ChartData, ChartPeriod, DailyHolding, DailySnapshot, HistoryStats, HourlySnapshot,
    PortfolioHistory,
};
pub use recorder::{totals_of, HistoryRecorder};
