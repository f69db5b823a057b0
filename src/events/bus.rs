//! # Event bus for broadcasting engine events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from the retry loop, the engine and the
//! asynchronous handle.
//!
//! ## Architecture
//! ```text
//! Publishers:                         Receivers:
//!   ProbeExecution ──┐
//!   PollingEngine  ──┼──► Bus ──────► bus.subscribe() (tests, custom consumers)
//!   AsyncHandle    ──┘  (broadcast)   SubscriberSet listener ──► Subscribe::on_event
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and needs no runtime.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;
use crate::core::Config;

/// Broadcast channel for engine events.
///
/// Thin wrapper over [`tokio::sync::broadcast`] that provides `publish`/`subscribe` API.
/// Multiple publishers can publish concurrently; subscribers receive clones of each event.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately (send clones internally).
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// ### Notes
    /// - Capacity is **shared** across all receivers (not per-subscriber).
    /// - When receivers lag, they will observe `RecvError::Lagged`.
    /// - The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// - Takes ownership of the event; the broadcast channel clones it for each receiver.
    /// - If there are no receivers, the event is dropped (this function still returns immediately).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// - Each call creates an **independent** receiver.
    /// - A receiver only gets events **sent after** it subscribes.
    /// - Slow receivers get `RecvError::Lagged(n)` and skip over missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Creates a bus sized from [`Config::bus_capacity`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.bus_capacity_clamped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscribers_receive_events_published_after_subscribing() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::AttemptStarting));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::Exhausted).with_attempt(2));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Exhausted);
        assert_eq!(ev.attempt, Some(2));
    }

    #[test]
    fn publish_without_receivers_is_fine() {
        let bus = Bus::from_config(&Config::default());
        bus.publish(Event::new(EventKind::CleanupRan));
    }
}
