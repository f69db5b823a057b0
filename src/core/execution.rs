//! # ProbeExecution: the retry loop state machine.
//!
//! Drives the attempts of one resolution, one call to [`ProbeExecution::next`]
//! per attempt:
//!
//! ```text
//! NotStarted ──next()──► Attempting ──next()──► Attempting ... ──next()──► Exhausted
//!                          │                                         (returns false)
//!                          └─ per call:
//!                               ├─► attempts ≥ count? → Exhausted, return false
//!                               ├─► attempts > 0?     → sleep_before_attempt(attempts+1) (cancellable)
//!                               ├─► probe.attempt()   (cancellable)
//!                               └─► record Accepted | Rejected | Failed, return true
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**; an attempt never starts before the previous
//!   outcome and the following wait are complete.
//! - No wait happens before the first attempt.
//! - `count == 0` never runs the probe; `next()` returns `false` right away.
//! - The last outcome is kept until the next attempt begins, so the failure of
//!   the last attempt is still visible after exhaustion.
//! - Cancellation (during a wait or a probe call) surfaces as
//!   [`PollError::Canceled`]; it is never swallowed.

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PollError, ProbeFailure},
    events::{Bus, Event, EventKind},
    policies::RetryPolicy,
    probes::AcceptingProbe,
};

/// Outcome of one attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome<T> {
    /// The predicate accepted the value.
    Accepted(T),
    /// The probe produced a value the predicate rejected.
    Rejected,
    /// The probe failed.
    Failed(ProbeFailure),
}

/// Position of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// No attempt ran yet.
    NotStarted,
    /// At least one attempt ran and more may follow.
    Attempting,
    /// The budget is spent (terminal).
    Exhausted,
}

/// Retry loop over one [`AcceptingProbe`] and one [`RetryPolicy`].
pub struct ProbeExecution<'a, T> {
    probe: &'a AcceptingProbe<T>,
    retry: &'a RetryPolicy,
    bus: Option<&'a Bus>,
    attempts: u32,
    state: ExecutionState,
    outcome: Option<AttemptOutcome<T>>,
}

impl<'a, T: Send + 'static> ProbeExecution<'a, T> {
    /// Creates a fresh loop; nothing runs until [`next`](Self::next) is called.
    pub fn new(probe: &'a AcceptingProbe<T>, retry: &'a RetryPolicy, bus: Option<&'a Bus>) -> Self {
        Self {
            probe,
            retry,
            bus,
            attempts: 0,
            state: ExecutionState::NotStarted,
            outcome: None,
        }
    }

    /// Runs the next attempt.
    ///
    /// Returns `Ok(false)` once the budget is spent, `Ok(true)` after an
    /// attempt ran (whatever its outcome), `Err(Canceled)` if `ctx` fired.
    pub async fn next(&mut self, ctx: &CancellationToken) -> Result<bool, PollError> {
        if self.attempts >= self.retry.count() {
            self.state = ExecutionState::Exhausted;
            return Ok(false);
        }

        let attempt = self.attempts + 1;
        if self.attempts > 0 {
            let wait = self.retry.wait_before_attempt(attempt);
            self.publish(|| {
                Event::new(EventKind::WaitScheduled)
                    .with_attempt(attempt)
                    .with_delay(wait)
            });
            self.retry.sleep_before_attempt(attempt, ctx).await?;
        } else if ctx.is_cancelled() {
            return Err(PollError::Canceled);
        }

        self.state = ExecutionState::Attempting;
        self.outcome = None;
        self.attempts = attempt;
        self.publish(|| Event::new(EventKind::AttemptStarting).with_attempt(attempt));

        let res = select! {
            res = self.probe.attempt(ctx.child_token()) => res,
            _ = ctx.cancelled() => return Err(PollError::Canceled),
        };

        let outcome = match res {
            Ok(Some(value)) => {
                self.publish(|| Event::new(EventKind::AttemptAccepted).with_attempt(attempt));
                AttemptOutcome::Accepted(value)
            }
            Ok(None) => {
                self.publish(|| Event::new(EventKind::AttemptRejected).with_attempt(attempt));
                AttemptOutcome::Rejected
            }
            Err(failure) => {
                self.publish(|| {
                    Event::new(EventKind::AttemptFailed)
                        .with_attempt(attempt)
                        .with_reason(failure.to_string())
                });
                AttemptOutcome::Failed(failure)
            }
        };
        self.outcome = Some(outcome);
        Ok(true)
    }

    /// Attempts run so far.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Current position of the loop.
    #[inline]
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Outcome of the most recent attempt.
    pub fn outcome(&self) -> Option<&AttemptOutcome<T>> {
        self.outcome.as_ref()
    }

    /// The accepted value of the most recent attempt, if any.
    pub fn result(&self) -> Option<&T> {
        match &self.outcome {
            Some(AttemptOutcome::Accepted(value)) => Some(value),
            _ => None,
        }
    }

    /// Moves the accepted value out, leaving the outcome as `Rejected`.
    pub fn take_result(&mut self) -> Option<T> {
        match self.outcome.take() {
            Some(AttemptOutcome::Accepted(value)) => {
                self.outcome = Some(AttemptOutcome::Rejected);
                Some(value)
            }
            other => {
                self.outcome = other;
                None
            }
        }
    }

    /// Failure of the most recent attempt, if it failed.
    pub fn last_error(&self) -> Option<&ProbeFailure> {
        match &self.outcome {
            Some(AttemptOutcome::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = self.bus {
            bus.publish(ev().with_probe(self.probe.name()));
        }
    }
}
