//! # Events emitted while a resolution runs.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Attempt events**: one attempt's flow (starting, accepted, rejected, failed, wait)
//! - **Terminal events**: how the resolution ended (exhausted, qualification failure, cancelled, timeout)
//! - **Subscriber events**: overflow and panics of event subscribers
//!
//! The [`Event`] struct carries metadata such as timestamps, probe name,
//! attempt numbers, reasons and wait delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one resolution the attempt events are published in attempt order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AttemptFailed)
//!     .with_probe("health-check")
//!     .with_reason("connection refused")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::AttemptFailed);
//! assert_eq!(ev.probe.as_deref(), Some("health-check"));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::Stage;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Attempt events ===
    /// An attempt is about to invoke the probe.
    ///
    /// Sets: `probe`, `attempt` (1-based).
    AttemptStarting,

    /// The attempt produced a value the predicate accepted.
    ///
    /// Sets: `probe`, `attempt`.
    AttemptAccepted,

    /// The attempt produced a value the predicate rejected.
    ///
    /// Sets: `probe`, `attempt`.
    AttemptRejected,

    /// The probe failed during the attempt.
    ///
    /// Sets: `probe`, `attempt`, `reason` (failure message).
    AttemptFailed,

    /// The loop is about to wait before the next attempt.
    ///
    /// Sets: `probe`, `attempt` (the upcoming attempt), `delay_ms`.
    WaitScheduled,

    // === Terminal events ===
    /// The retry budget ran out without an accepted value.
    ///
    /// Sets: `probe`, `attempt` (attempts run).
    Exhausted,

    /// A probe failure was escalated and aborted the resolution.
    ///
    /// Sets: `probe`, `attempt`, `stage`, `reason`.
    QualificationFailed,

    /// The resolution was cancelled (explicit cancel or timeout).
    ///
    /// Sets: `probe`, `attempt` (attempts started so far).
    ResolutionCanceled,

    /// The overall deadline of an asynchronous handle was exceeded.
    ///
    /// Sets: `probe`, `timeout_ms`.
    TimeoutHit,

    /// The cleanup hook of the resolution ran.
    ///
    /// Sets: `probe`.
    CleanupRan,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `probe` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `probe` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Engine event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the probe (or subscriber, for subscriber events).
    pub probe: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Wait before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Handle deadline in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Stage of a qualification failure.
    pub stage: Option<Stage>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            probe: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            stage: None,
            reason: None,
        }
    }

    /// Attaches a probe name.
    #[inline]
    pub fn with_probe(mut self, probe: impl Into<Arc<str>>) -> Self {
        self.probe = Some(probe.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a wait delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a deadline (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches the stage of a qualification failure.
    #[inline]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_probe(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_probe(subscriber)
            .with_reason(info)
    }

    /// True for events that end a resolution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::AttemptAccepted
                | EventKind::Exhausted
                | EventKind::QualificationFailed
                | EventKind::ResolutionCanceled
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
