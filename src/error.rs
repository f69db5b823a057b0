//! Error types used by the polling engine and its probes.
//!
//! This module defines the error taxonomy of one resolution:
//!
//! - [`ProbeFailure`] — the probe raised an error during one attempt.
//! - [`QualificationError`] — a probe failure the active
//!   [`ExceptionPolicy`](crate::ExceptionPolicy) escalated into a fatal one.
//! - [`PollError`] — the single failure type seen by callers of
//!   [`PollingEngine::resolve`](crate::PollingEngine::resolve) and
//!   [`AsyncHandle`](crate::AsyncHandle): qualification failures, cancellation,
//!   timeouts and missing results.
//!
//! Exhaustion without an accepted value is **not** an error; it is reported as `Ok(None)`.
//!
//! All enums provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by probes.
///
/// Any `std::error::Error + Send + Sync` converts into it with `?`, as do `&str` and `String`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// # Error raised by a single probe attempt.
///
/// Wraps the original error behind an `Arc`, so the failure can be remembered
/// by the retry loop and still be handed over to a [`QualificationError`].
/// The original error stays reachable through [`ProbeFailure::get_ref`] and
/// [`ProbeFailure::downcast_ref`].
#[derive(Clone)]
pub struct ProbeFailure {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl ProbeFailure {
    /// Wraps a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Wraps an already boxed error (what probes return).
    pub fn from_boxed(error: BoxError) -> Self {
        Self {
            inner: Arc::from(error),
        }
    }

    /// Builds a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from_boxed(BoxError::from(message.into()))
    }

    /// Returns the original error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Attempts to downcast the original error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ProbeFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<BoxError> for ProbeFailure {
    fn from(error: BoxError) -> Self {
        Self::from_boxed(error)
    }
}

/// Stage of the resolution at which a qualification failure was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Raised right after a failed attempt, while retries were still possible.
    Intermediate,
    /// Raised at exhaustion, because the last attempt failed and produced no result.
    Final,
}

/// # Escalated probe failure.
///
/// Produced only by the [`ExceptionPolicy`](crate::ExceptionPolicy); it is the
/// only way a probe error crosses the engine boundary. The original cause is
/// kept and exposed through [`std::error::Error::source`].
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum QualificationError {
    /// The policy refused to ignore the failure of one attempt.
    #[error("unable to obtain the result during attempt {attempt}, because of: {cause}")]
    Intermediate {
        /// Attempt number (1-based) that failed.
        attempt: u32,
        /// The original probe failure.
        #[source]
        cause: ProbeFailure,
    },

    /// The retry budget ran out and the last attempt failed.
    #[error("unable to obtain the result after {attempts} attempts and finished in error, because of: {cause}")]
    Exhausted {
        /// Number of attempts that ran.
        attempts: u32,
        /// The failure of the last attempt.
        #[source]
        cause: ProbeFailure,
    },
}

impl QualificationError {
    /// Returns the stage at which the failure was raised.
    pub fn stage(&self) -> Stage {
        match self {
            QualificationError::Intermediate { .. } => Stage::Intermediate,
            QualificationError::Exhausted { .. } => Stage::Final,
        }
    }

    /// Returns the original probe failure.
    pub fn cause(&self) -> &ProbeFailure {
        match self {
            QualificationError::Intermediate { cause, .. } => cause,
            QualificationError::Exhausted { cause, .. } => cause,
        }
    }

    /// Returns the attempt number of the failure (the last one for `Exhausted`).
    pub fn attempt(&self) -> u32 {
        match self {
            QualificationError::Intermediate { attempt, .. } => *attempt,
            QualificationError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pollvisor::{ProbeFailure, QualificationError};
    ///
    /// let err = QualificationError::Intermediate { attempt: 1, cause: ProbeFailure::msg("boom") };
    /// assert_eq!(err.as_label(), "qualification_intermediate");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            QualificationError::Intermediate { .. } => "qualification_intermediate",
            QualificationError::Exhausted { .. } => "qualification_exhausted",
        }
    }
}

/// # Errors produced by a resolution.
///
/// This is the uniform failure type of both the synchronous and the
/// asynchronous surface. Cancellation and timeouts are never conflated with
/// qualification failures; see [`PollError::is_cancellation`].
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum PollError {
    /// A probe failure was escalated by the exception policy.
    #[error(transparent)]
    Qualification(#[from] QualificationError),

    /// The resolution was cancelled before it completed.
    #[error("resolution cancelled")]
    Canceled,

    /// The overall deadline of the handle was exceeded.
    #[error("timed out after {timeout:?}")]
    TimedOut {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// A value was required but the resolution finished without one.
    #[error("no result is available")]
    NoResult,

    /// The worker could not run the resolution (runtime unavailable, panic).
    #[error("worker failed: {error}")]
    Worker {
        /// Description of the worker failure.
        error: String,
    },
}

impl PollError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pollvisor::PollError;
    /// use std::time::Duration;
    ///
    /// let err = PollError::TimedOut { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "poll_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PollError::Qualification(e) => e.as_label(),
            PollError::Canceled => "poll_canceled",
            PollError::TimedOut { .. } => "poll_timeout",
            PollError::NoResult => "poll_no_result",
            PollError::Worker { .. } => "poll_worker_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PollError::Qualification(e) => format!("qualification: {e}"),
            PollError::Canceled => "resolution cancelled".to_string(),
            PollError::TimedOut { timeout } => format!("timeout: {timeout:?}"),
            PollError::NoResult => "no result".to_string(),
            PollError::Worker { error } => format!("worker: {error}"),
        }
    }

    /// Indicates whether the error is a cancellation signal (explicit cancel or timeout).
    ///
    /// # Example
    /// ```
    /// use pollvisor::PollError;
    ///
    /// assert!(PollError::Canceled.is_cancellation());
    /// assert!(!PollError::NoResult.is_cancellation());
    /// ```
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PollError::Canceled | PollError::TimedOut { .. })
    }

    /// Returns the qualification failure, if that is what this error is.
    pub fn qualification(&self) -> Option<&QualificationError> {
        match self {
            PollError::Qualification(e) => Some(e),
            _ => None,
        }
    }
}
