//! # Runtime configuration.
//!
//! Provides [`Config`], the settings shared by asynchronous handles, the
//! executors that run them and the event bus.
//!
//! Config is used in three ways:
//! 1. **Dedicated executors**: `Executor::dedicated(&config)`
//! 2. **Handle defaults**: `AsyncHandle::with_config(&config)`
//! 3. **Event bus sizing**: `Bus::from_config(&config)`
//!
//! ## Sentinel values
//! - `timeout = 0s` → no overall deadline
//! - `worker_threads = 0` → tokio's default (one per core)

use std::time::Duration;

/// Configuration for asynchronous resolutions.
///
/// ## Field semantics
/// - `timeout`: Overall deadline of one asynchronous resolution (`0s` = none)
/// - `worker_threads`: Threads of a dedicated executor (`0` = tokio default)
/// - `thread_name`: Thread name prefix of a dedicated executor
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default overall deadline applied to asynchronous handles.
    ///
    /// The deadline covers the whole resolution (every attempt and wait),
    /// never a single attempt.
    pub timeout: Duration,

    /// Number of worker threads of a dedicated executor.
    pub worker_threads: usize,

    /// Thread name used by a dedicated executor.
    pub thread_name: String,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the default deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → the whole resolution must finish within `d`
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the worker thread count as an `Option` (`None` = tokio default).
    #[inline]
    pub fn worker_threads(&self) -> Option<usize> {
        if self.worker_threads == 0 {
            None
        } else {
            Some(self.worker_threads)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `timeout = 0s` (no deadline)
    /// - `worker_threads = 0` (tokio default)
    /// - `thread_name = "pollvisor-worker"`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            worker_threads: 0,
            thread_name: "pollvisor-worker".to_string(),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none() {
        let cfg = Config::default();
        assert_eq!(cfg.default_timeout(), None);
        assert_eq!(cfg.worker_threads(), None);
    }

    #[test]
    fn explicit_values_are_kept() {
        let cfg = Config {
            timeout: Duration::from_secs(3),
            worker_threads: 2,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.default_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(cfg.worker_threads(), Some(2));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
