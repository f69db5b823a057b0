//! # Exponential wait between attempts.
//!
//! [`BackoffPolicy`] is the exponential flavour of
//! [`WaitStrategy`](crate::WaitStrategy). It is parameterized by:
//! - [`BackoffPolicy::first`] the wait before the first retry;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum wait cap.
//!
//! The wait before retry `n` (1-based, so retry 1 happens before attempt 2) is
//! `first × factor^(n-1)`, clamped to `max`, then jitter is applied. The base is
//! derived from the retry number alone, so jitter never feeds back into later waits.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! // 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.delay(11), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential wait policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Wait before the first retry.
    pub first: Duration,
    /// Maximum wait between two attempts.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each wait.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the wait before the given retry (1-based; `0` is treated as `1`).
    ///
    /// # Notes
    /// - `factor == 1.0` keeps the wait constant at `first` (up to `max`).
    /// - Non-finite or negative intermediate values clamp to `max`.
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max.as_secs_f64();
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
