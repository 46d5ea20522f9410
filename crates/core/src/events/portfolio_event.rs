use serde::Serialize;

use crate::history::{ChartData, ChartPeriod};
use crate::snapshot::PortfolioSnapshot;

/// Outbound notifications for the display layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum PortfolioEvent {
    /// The full snapshot after a holdings or price cycle.
    SnapshotUpdated(Box<PortfolioSnapshot>),
    /// Chart points for the configured period.
    HistoryUpdated { period: ChartPeriod, data: ChartData },
    /// A cycle failed; the snapshot (if any) is unchanged.
    #[serde(rename_all = "camelCase")]
    Error { has_error: bool, message: String },
}

impl PortfolioEvent {
    pub fn snapshot_updated(snapshot: PortfolioSnapshot) -> Self {
        Self::SnapshotUpdated(Box::new(snapshot))
    }

    pub fn history_updated(period: ChartPeriod, data: ChartData) -> Self {
        Self::HistoryUpdated { period, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            has_error: true,
            message: message.into(),
        }
    }

    /// Event name used on the wire (SSE `event:` field).
    pub fn name(&self) -> &'static str {
        match self {
            Self::SnapshotUpdated(_) => "snapshot-updated",
            Self::HistoryUpdated { .. } => "history-updated",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_tags() {
        let events = vec![
            PortfolioEvent::snapshot_updated(PortfolioSnapshot::default()),
            PortfolioEvent::history_updated(ChartPeriod::OneDay, ChartData::Hourly(Vec::new())),
            PortfolioEvent::error("boom"),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }

    #[test]
    fn test_error_payload() {
        let value = serde_json::to_value(PortfolioEvent::error("boom")).unwrap();
        assert_eq!(value["payload"]["hasError"], true);
        assert_eq!(value["payload"]["message"], "boom");
    }
}
