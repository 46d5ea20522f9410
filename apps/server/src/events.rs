use fintech_core::events::{PortfolioEvent, PortfolioEventSink};
use serde_json::Value;
use tokio::sync::broadcast;

/// Event name plus JSON payload, ready for an SSE frame.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub name: &'static str,
    pub payload: Value,
}

impl From<&PortfolioEvent> for ServerEvent {
    fn from(event: &PortfolioEvent) -> Self {
        let payload = match serde_json::to_value(event) {
            Ok(mut value) => value
                .get_mut("payload")
                .map(Value::take)
                .unwrap_or(Value::Null),
            Err(e) => {
                tracing::error!("Failed to serialize {} event: {}", event.name(), e);
                Value::Null
            }
        };
        Self {
            name: event.name(),
            payload,
        }
    }
}

/// Broadcast bus that fans portfolio events out to connected clients.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ServerEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl PortfolioEventSink for EventBus {
    fn emit(&self, event: PortfolioEvent) {
        self.publish(ServerEvent::from(&event));
    }
}
