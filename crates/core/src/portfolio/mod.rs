//! Positions, merging, valuation, forex records and the status banner.

mod forex;
mod merger;
mod position;
mod status;
mod valuation;

pub use forex::{with_inverses, ForexRate};
pub use merger::merge_holdings;
pub use position::Position;
pub use status::{Severity, StatusBanner};
pub use valuation::{
    apply_quote, clear_price, compute_totals, gain_loss_percent, revalue, sort_positions,
    PortfolioTotals,
};
