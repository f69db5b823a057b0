//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`]: listens on a [`Bus`] and distributes its events
//! to multiple subscribers concurrently without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! Bus ──► listener ──► emit(event)
//!                         │
//!                         ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!                         │    (bounded)         └──────► panic → SubscriberPanicked
//!                         ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!                         └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: slow/panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//! - A lagging listener skips the events the bus dropped and keeps going.
//!
//! ## Panic handling
//! Worker tasks use `catch_unwind` to isolate panics: the panic becomes a
//! `SubscriberPanicked` event and the worker continues with the next event.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::core::Executor;
use crate::error::PollError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

struct Fanout {
    channels: Vec<SubscriberChannel>,
    bus: Bus,
}

impl Fanout {
    fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus.publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }
}

/// Fan-out coordinator for event subscribers of one bus.
pub struct SubscriberSet {
    fanout: Arc<Fanout>,
    workers: Vec<JoinHandle<()>>,
    listener: JoinHandle<()>,
}

impl SubscriberSet {
    /// Subscribes to `bus` and spawns one worker per subscriber on `executor`.
    ///
    /// Events published on `bus` after this call returns are delivered.
    pub fn new(
        subs: Vec<Arc<dyn Subscribe>>,
        bus: Bus,
        executor: &Executor,
    ) -> Result<Self, PollError> {
        let handle = executor.handle()?;
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let bus_for_worker = bus.clone();

            workers.push(handle.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let any = &*panic_err;
                        let info = if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        bus_for_worker.publish(Event::subscriber_panicked(sub.name(), info));
                    }
                }
            }));
            channels.push(SubscriberChannel { name, sender: tx });
        }

        let fanout = Arc::new(Fanout { channels, bus });
        let mut rx = fanout.bus.subscribe();
        let listener_fanout = Arc::clone(&fanout);
        let listener = handle.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => listener_fanout.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Self {
            fanout,
            workers,
            listener,
        })
    }

    /// Emits an event to all subscribers directly, bypassing the bus.
    pub fn emit(&self, event: &Event) {
        self.fanout.emit_arc(Arc::new(event.clone()));
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.fanout.channels.len()
    }

    /// True if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.fanout.channels.is_empty()
    }

    /// Stops listening and waits for every worker to drain its queue.
    pub async fn shutdown(self) {
        self.listener.abort();
        let _ = self.listener.await;
        drop(self.fanout);

        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push(event.kind);
            }
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, event: &Event) {
            if event.kind == EventKind::AttemptFailed {
                panic!("boom");
            }
        }
        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn bus_events_reach_every_subscriber() {
        let bus = Bus::new(64);
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::new(
            vec![collect.clone() as Arc<dyn Subscribe>],
            bus.clone(),
            &Executor::current(),
        )
        .unwrap();
        assert_eq!(set.len(), 1);

        bus.publish(Event::new(EventKind::AttemptStarting));
        bus.publish(Event::new(EventKind::AttemptAccepted));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        set.shutdown().await;

        let seen = collect.0.lock().unwrap().clone();
        assert_eq!(seen, vec![EventKind::AttemptStarting, EventKind::AttemptAccepted]);
    }

    #[tokio::test]
    async fn panicking_subscriber_is_reported_and_isolated() {
        let bus = Bus::new(64);
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::new(
            vec![Arc::new(Explode) as Arc<dyn Subscribe>, collect.clone() as Arc<dyn Subscribe>],
            bus.clone(),
            &Executor::current(),
        )
        .unwrap();

        bus.publish(Event::new(EventKind::AttemptFailed));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        set.shutdown().await;

        let seen = collect.0.lock().unwrap().clone();
        assert!(seen.contains(&EventKind::AttemptFailed));
        assert!(seen.contains(&EventKind::SubscriberPanicked));
    }
}
