//! Fan-out of `BusEvent` notifications.
//!
//! A thin wrapper over `tokio::sync::broadcast`. Publishing never blocks and
//! never fails: with nobody listening the event is discarded, and a subscriber
//! that falls more than `capacity` events behind sees `Lagged` and skips ahead.

use stratum_types::event::BusEvent;
use tokio::sync::broadcast;

/// Sender side of the bus notification channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// `capacity` is the number of events a subscriber may fall behind by.
    pub fn new(capacity: usize) -> Self {
        let (tx, _initial_rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Hand `event` to every live subscriber; returns how many there were.
    pub fn publish(&self, event: BusEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
