//! # Jitter applied to waits between attempts.
//!
//! [`JitterPolicy`] randomizes the computed wait so that many pollers started
//! at the same time do not hit the polled resource in lockstep.
//!
//! - [`JitterPolicy::None`] no randomization
//! - [`JitterPolicy::Full`] random wait in `[0, wait]`
//! - [`JitterPolicy::Equal`] `wait/2 + random[0, wait/2]`
//! - [`JitterPolicy::Decorrelated`] random wait in `[base, wait × 3]`, capped at max

use rand::Rng;
use std::time::Duration;

/// Randomization strategy for waits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact wait, predictable timing.
    #[default]
    None,
    /// Random wait in `[0, wait]`.
    Full,
    /// `wait/2 + random[0, wait/2]`; keeps ~75% of the wait on average.
    Equal,
    /// Random wait in `[base, wait × 3]`, capped at max.
    ///
    /// Requires context, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to the given wait.
    ///
    /// For `Decorrelated` the input is returned unchanged.
    pub fn apply(&self, wait: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => wait,
            JitterPolicy::Full => Self::full(wait),
            JitterPolicy::Equal => Self::equal(wait),
        }
    }

    /// Applies decorrelated jitter with full context.
    ///
    /// Falls back to [`apply`](Self::apply) for other policies.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(base_ms);

        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }

    fn full(wait: Duration) -> Duration {
        let ms = wait.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    fn equal(wait: Duration) -> Duration {
        let ms = wait.as_millis() as u64;
        let half = ms / 2;
        if half == 0 {
            return Duration::from_millis(ms);
        }
        Duration::from_millis(half + rand::rng().random_range(0..=half))
    }
}
