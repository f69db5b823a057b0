//! # Retry budget and wait between attempts.
//!
//! [`RetryPolicy`] bundles the number of attempts a resolution may run with the
//! [`WaitStrategy`] used between two consecutive attempts.
//!
//! ## Indexing
//! ```text
//! attempt:   1        2        3        ...   count
//!            │  wait  │  wait  │  wait        │
//!            │ (r=1)  │ (r=2)  │ (r=3)        │
//! ```
//! The strategy is indexed by the *retry number* `r` (1 = the wait before
//! attempt 2). Nothing is waited before the first attempt, so `count == 1`
//! never sleeps, and constant waits add up to `(count - 1) × wait`.
//!
//! ## Cancellation
//! [`RetryPolicy::sleep_before_attempt`] races the wait against a
//! [`CancellationToken`]; a cancelled wait returns [`PollError::Canceled`]
//! immediately instead of sleeping the remainder.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::RetryPolicy;
//!
//! let policy = RetryPolicy::of_incremental(3, Duration::from_millis(10));
//! assert_eq!(policy.count(), 3);
//! assert_eq!(policy.wait_before_attempt(1), Duration::ZERO);
//! assert_eq!(policy.wait_before_attempt(2), Duration::from_millis(10));
//! assert_eq!(policy.wait_before_attempt(3), Duration::from_millis(20));
//!
//! let longer = policy.with_count(5);
//! assert_eq!(longer.count(), 5);
//! assert_eq!(policy.count(), 3);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::PollError;
use crate::policies::backoff::BackoffPolicy;

/// Function of the retry number (1-based) to the wait before that retry.
pub type WaitFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// How long to wait before each retry.
#[derive(Clone)]
pub enum WaitStrategy {
    /// Same wait before every retry.
    Constant(Duration),
    /// `unit × retry`: `unit`, `2 × unit`, `3 × unit`, ...
    Incremental(Duration),
    /// Exponential growth with optional jitter.
    Backoff(BackoffPolicy),
    /// Arbitrary function of the retry number.
    Custom(WaitFn),
}

impl WaitStrategy {
    /// Returns the wait before the given retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            WaitStrategy::Constant(wait) => *wait,
            WaitStrategy::Incremental(unit) => unit.saturating_mul(retry),
            WaitStrategy::Backoff(backoff) => backoff.delay(retry),
            WaitStrategy::Custom(f) => f(retry),
        }
    }
}

impl fmt::Debug for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategy::Constant(wait) => write!(f, "Constant({wait:?})"),
            WaitStrategy::Incremental(unit) => write!(f, "Incremental({unit:?})"),
            WaitStrategy::Backoff(backoff) => f.debug_tuple("Backoff").field(backoff).finish(),
            WaitStrategy::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// Retry budget plus wait strategy.
///
/// Immutable: every `with_*` method returns a new value.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    count: u32,
    wait: WaitStrategy,
}

impl RetryPolicy {
    /// `count` attempts, waiting `wait` between them.
    pub fn of(count: u32, wait: Duration) -> Self {
        Self {
            count,
            wait: WaitStrategy::Constant(wait),
        }
    }

    /// `count` attempts, waiting `ms` milliseconds between them.
    pub fn of_ms(count: u32, ms: u64) -> Self {
        Self::of(count, Duration::from_millis(ms))
    }

    /// `count` attempts, waiting `unit × retry` before each retry.
    pub fn of_incremental(count: u32, unit: Duration) -> Self {
        Self {
            count,
            wait: WaitStrategy::Incremental(unit),
        }
    }

    /// Millisecond flavour of [`RetryPolicy::of_incremental`].
    pub fn of_incremental_ms(count: u32, ms: u64) -> Self {
        Self::of_incremental(count, Duration::from_millis(ms))
    }

    /// `count` attempts, waiting `wait(retry)` before each retry.
    pub fn from_fn<F>(count: u32, wait: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            count,
            wait: WaitStrategy::Custom(Arc::new(wait)),
        }
    }

    /// `count` attempts with exponential waits.
    pub fn with_backoff(count: u32, backoff: BackoffPolicy) -> Self {
        Self {
            count,
            wait: WaitStrategy::Backoff(backoff),
        }
    }

    /// Exactly one attempt.
    pub fn once() -> Self {
        Self::of_ms(1, 1)
    }

    /// Maximum number of attempts.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The wait strategy.
    #[inline]
    pub fn strategy(&self) -> &WaitStrategy {
        &self.wait
    }

    /// Same strategy, different budget.
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            count,
            wait: self.wait.clone(),
        }
    }

    /// Same budget, constant wait.
    pub fn with_wait(&self, wait: Duration) -> Self {
        Self::of(self.count, wait)
    }

    /// Same budget, another strategy.
    pub fn with_strategy(&self, wait: WaitStrategy) -> Self {
        Self {
            count: self.count,
            wait,
        }
    }

    /// Wait before the given attempt (1-based). Always zero for the first attempt.
    pub fn wait_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.wait.delay(attempt - 1)
    }

    /// Sleeps before `attempt`, returning early with [`PollError::Canceled`] if `ctx` fires.
    pub async fn sleep_before_attempt(
        &self,
        attempt: u32,
        ctx: &CancellationToken,
    ) -> Result<Duration, PollError> {
        if ctx.is_cancelled() {
            return Err(PollError::Canceled);
        }
        let wait = self.wait_before_attempt(attempt);
        if wait.is_zero() {
            return Ok(wait);
        }

        #[cfg(feature = "logging")]
        tracing::trace!(attempt, wait_ms = wait.as_millis() as u64, "waiting before attempt");

        let sleep = time::sleep(wait);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => Ok(wait),
            _ = ctx.cancelled() => Err(PollError::Canceled),
        }
    }
}

impl Default for RetryPolicy {
    /// Same as [`RetryPolicy::once`].
    fn default() -> Self {
        Self::once()
    }
}
