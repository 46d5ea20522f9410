//! Portfolio events.
//!
//! The orchestrator emits events through [`PortfolioEventSink`] after each
//! cycle. The server implements the sink to fan events out to subscribers.

mod portfolio_event;
mod sink;

pub use portfolio_event::*;
pub use sink::*;
