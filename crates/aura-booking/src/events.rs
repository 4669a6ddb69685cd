//! # Event Bus
//!
//! Fan-out of [`DomainEvent`]s over a tokio broadcast channel. Publishing
//! never blocks and never fails the operation that produced the event; a
//! subscriber that falls behind by more than the capacity sees
//! `RecvError::Lagged`.

use aura_core::DomainEvent;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        let appointment_id = event.appointment_id().to_string();
        match self.sender.send(event) {
            Ok(receivers) => debug!(appointment_id = %appointment_id, receivers, "Event published"),
            Err(_) => debug!(appointment_id = %appointment_id, "Event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(256)
    }
}
