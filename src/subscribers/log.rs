//! # Logging subscriber.
//!
//! [`LogWriter`] turns engine events into `tracing` records. Attempt flow is
//! logged at `debug`, failures and deadlines at `warn`, escalated failures and
//! subscriber panics at `error`.
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use pollvisor::{Bus, Executor, LogWriter, Subscribe, SubscriberSet};
//! # async fn demo() -> Result<(), pollvisor::PollError> {
//! let bus = Bus::new(256);
//! let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//! let set = SubscriberSet::new(subs, bus.clone(), &Executor::current())?;
//! // hand `bus` to the builder with `.with_bus(bus)`
//! set.shutdown().await;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing` logging subscriber.
///
/// Enabled via the `logging` feature.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let probe = e.probe.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::AttemptStarting => {
                debug!(probe, attempt = e.attempt, "attempt starting");
            }
            EventKind::AttemptAccepted => {
                info!(probe, attempt = e.attempt, "value accepted");
            }
            EventKind::AttemptRejected => {
                debug!(probe, attempt = e.attempt, "value rejected");
            }
            EventKind::AttemptFailed => {
                warn!(probe, attempt = e.attempt, err = e.reason.as_deref(), "attempt failed");
            }
            EventKind::WaitScheduled => {
                debug!(probe, attempt = e.attempt, delay_ms = e.delay_ms, "waiting before attempt");
            }
            EventKind::Exhausted => {
                info!(probe, attempts = e.attempt, "retries exhausted without result");
            }
            EventKind::QualificationFailed => {
                error!(
                    probe,
                    attempt = e.attempt,
                    stage = ?e.stage,
                    err = e.reason.as_deref(),
                    "resolution failed"
                );
            }
            EventKind::ResolutionCanceled => {
                info!(probe, attempts = e.attempt, "resolution cancelled");
            }
            EventKind::TimeoutHit => {
                warn!(probe, timeout_ms = e.timeout_ms, "resolution timed out");
            }
            EventKind::CleanupRan => {
                debug!(probe, "cleanup ran");
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = probe, info = e.reason.as_deref(), "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = probe, reason = e.reason.as_deref(), "subscriber dropped event");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
