//! Retry, wait and exception policies.
//!
//! This module groups the knobs that control **how many** attempts a
//! resolution may run, **how long** to wait between them, and **what** a probe
//! failure means for the resolution.
//!
//! ## Contents
//! - [`RetryPolicy`]     attempt budget + [`WaitStrategy`]
//! - [`BackoffPolicy`]   exponential wait (first / factor / max + jitter)
//! - [`JitterPolicy`]    randomization of waits
//! - [`ExceptionPolicy`] ignore or escalate probe failures
//!
//! ## Quick wiring
//! ```text
//! PollingEngine { retry: RetryPolicy, exceptions: ExceptionPolicy, .. }
//!      └─► core::execution::ProbeExecution uses:
//!           - retry.count() to bound the loop
//!           - retry.sleep_before_attempt(n, ctx) between attempts
//!      └─► core::engine::PollingEngine uses:
//!           - exceptions.on_attempt_exception(..) after a failed attempt
//!           - exceptions.on_exhaustion_exception(..) when the budget runs out
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → one attempt ([`RetryPolicy::once`]).
//! - `ExceptionPolicy::default()` → fail on the first probe failure.
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.

mod backoff;
mod exception;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use exception::{ExceptionDecision, ExceptionPolicy};
pub use jitter::JitterPolicy;
pub use retry::{RetryPolicy, WaitFn, WaitStrategy};
