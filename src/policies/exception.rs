//! # Exception policy for probe failures.
//!
//! [`ExceptionPolicy`] decides what a probe failure means for the resolution:
//!
//! | `ignore_intermediate` | `ignore_final` | failure during attempt `k` | last attempt failed, no result |
//! |-----------------------|----------------|----------------------------|--------------------------------|
//! | `false` (default)     | —              | fatal immediately          | —                              |
//! | `true`                | `false`        | ignored, retry             | fatal ([`Stage::Final`](crate::Stage::Final)) |
//! | `true`                | `true`         | ignored, retry             | empty result                   |
//!
//! A fatal decision always wraps the original failure into a [`QualificationError`].

use crate::error::{ProbeFailure, QualificationError};

/// Decision taken by the [`ExceptionPolicy`] for one failure.
#[derive(Debug, Clone)]
pub enum ExceptionDecision {
    /// Keep going: retry, or finish with an empty result at exhaustion.
    Continue,
    /// Abort the resolution with this error.
    Fail(QualificationError),
}

impl ExceptionDecision {
    /// Converts the decision into a `Result`, for `?` in the engine.
    pub fn into_result(self) -> Result<(), QualificationError> {
        match self {
            ExceptionDecision::Continue => Ok(()),
            ExceptionDecision::Fail(e) => Err(e),
        }
    }
}

/// Pure decision function over probe failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExceptionPolicy {
    /// Swallow per-attempt failures and retry.
    pub ignore_intermediate: bool,
    /// When the budget runs out and the last attempt failed, return an empty result instead of failing.
    pub ignore_final: bool,
}

impl ExceptionPolicy {
    /// Every failure aborts the resolution (default).
    pub const fn fail_fast() -> Self {
        Self {
            ignore_intermediate: false,
            ignore_final: false,
        }
    }

    /// Ignore per-attempt failures; `ignore_final` controls the trailing one.
    pub const fn ignoring(ignore_final: bool) -> Self {
        Self {
            ignore_intermediate: true,
            ignore_final,
        }
    }

    /// Decides about the failure of `attempt`.
    pub fn on_attempt_exception(&self, attempt: u32, failure: &ProbeFailure) -> ExceptionDecision {
        if self.ignore_intermediate {
            ExceptionDecision::Continue
        } else {
            ExceptionDecision::Fail(QualificationError::Intermediate {
                attempt,
                cause: failure.clone(),
            })
        }
    }

    /// Decides at exhaustion, given the failure of the last attempt (if it failed).
    pub fn on_exhaustion_exception(
        &self,
        attempts: u32,
        last: Option<&ProbeFailure>,
    ) -> ExceptionDecision {
        match last {
            Some(failure) if !self.ignore_final => {
                ExceptionDecision::Fail(QualificationError::Exhausted {
                    attempts,
                    cause: failure.clone(),
                })
            }
            _ => ExceptionDecision::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn boom() -> ProbeFailure {
        ProbeFailure::msg("boom")
    }

    #[test]
    fn default_fails_on_first_exception() {
        let policy = ExceptionPolicy::default();
        match policy.on_attempt_exception(1, &boom()) {
            ExceptionDecision::Fail(e) => {
                assert_eq!(e.stage(), Stage::Intermediate);
                assert_eq!(e.attempt(), 1);
                assert_eq!(e.cause().to_string(), "boom");
            }
            ExceptionDecision::Continue => panic!("expected failure"),
        }
    }

    #[test]
    fn ignoring_continues_per_attempt() {
        let policy = ExceptionPolicy::ignoring(false);
        assert!(policy.on_attempt_exception(2, &boom()).into_result().is_ok());
    }

    #[test]
    fn trailing_exception_surfaces_unless_ignored() {
        let strict = ExceptionPolicy::ignoring(false);
        let err = strict
            .on_exhaustion_exception(3, Some(&boom()))
            .into_result()
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Final);
        assert_eq!(err.attempt(), 3);

        let lenient = ExceptionPolicy::ignoring(true);
        assert!(lenient.on_exhaustion_exception(3, Some(&boom())).into_result().is_ok());
    }

    #[test]
    fn exhaustion_without_failure_continues() {
        let policy = ExceptionPolicy::ignoring(false);
        assert!(policy.on_exhaustion_exception(3, None).into_result().is_ok());
    }
}
