//! Portfolio event sink trait and implementations.

use std::sync::{Arc, Mutex};

use super::PortfolioEvent;

/// Receives portfolio events from the orchestrator.
///
/// `emit()` must not block. Delivery is best-effort: a sink that cannot
/// deliver drops the event, and the sync cycle carries on.
pub trait PortfolioEventSink: Send + Sync {
    fn emit(&self, event: PortfolioEvent);

    /// Default implementation calls `emit()` for each event.
    fn emit_batch(&self, events: Vec<PortfolioEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpEventSink;

impl PortfolioEventSink for NoOpEventSink {
    fn emit(&self, _event: PortfolioEvent) {}
}

/// Collects emitted events for assertions.
#[derive(Clone, Default)]
pub struct MockEventSink {
    events: Arc<Mutex<Vec<PortfolioEvent>>>,
}

impl MockEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PortfolioEvent>> {
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn events(&self) -> Vec<PortfolioEvent> {
        self.lock().clone()
    }

    /// Names of the collected events, in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.lock().iter().map(PortfolioEvent::name).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl PortfolioEventSink for MockEventSink {
    fn emit(&self, event: PortfolioEvent) {
        self.lock().push(event);
    }
}
