//! # Typestate configuration stages.
//!
//! Each stage is a distinct type exposing only the calls allowed at that
//! point, so "predicate before action" or "interval before retry count" do
//! not compile:
//!
//! ```text
//! ActionStage ──ignore_exception*()──► PredicateStage ──expecting*()──► RetryStage
//!      └──────────────expecting*() (fail-fast)──────────────────────────────┘ │
//!                                                                              │
//! RetryStage ──repeat_count(n) / repeat_twice()──► IntervalStage ──every*()──► ReadyStage
//!      └──────repeat(policy) / repeat_only_once()───────────────────────────────┘
//! ```
//!
//! Every step consumes the stage and returns a new value; nothing is shared
//! between two builders.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{AsyncHandle, CleanupFn, Executor, Pending, PollingEngine},
    error::PollError,
    events::Bus,
    policies::{ExceptionPolicy, RetryPolicy},
    probes::{AcceptingProbe, Expectation, ProbeRef},
};

/// State carried through every stage.
struct Draft<T> {
    probe: ProbeRef<T>,
    exceptions: ExceptionPolicy,
    cleanup: Option<CleanupFn>,
    bus: Option<Bus>,
}

impl<T> Draft<T> {
    fn add_cleanup(&mut self, hook: CleanupFn) {
        self.cleanup = Some(match self.cleanup.take() {
            None => hook,
            Some(prev) => Arc::new(move || {
                prev();
                hook();
            }),
        });
    }
}

/// First stage: the action is known, the exception policy is not.
pub struct ActionStage<T> {
    draft: Draft<T>,
}

impl<T: Send + 'static> ActionStage<T> {
    pub(crate) fn new(probe: ProbeRef<T>) -> Self {
        Self {
            draft: Draft {
                probe,
                exceptions: ExceptionPolicy::default(),
                cleanup: None,
                bus: None,
            },
        }
    }

    /// Registers a cleanup hook run once at the end of every resolution.
    pub(crate) fn with_cleanup(mut self, hook: CleanupFn) -> Self {
        self.draft.add_cleanup(hook);
        self
    }

    /// Ignores probe failures between attempts.
    ///
    /// With `also_dont_fail_when_no_result = true`, a failure of the last
    /// attempt yields an empty result instead of an error.
    pub fn ignore_exception(mut self, also_dont_fail_when_no_result: bool) -> PredicateStage<T> {
        self.draft.exceptions = ExceptionPolicy::ignoring(also_dont_fail_when_no_result);
        PredicateStage { draft: self.draft }
    }

    /// Ignores every probe failure, trailing one included.
    pub fn ignore_exceptions(self) -> PredicateStage<T> {
        self.ignore_exception(true)
    }

    /// Makes the first probe failure fatal.
    pub fn dont_ignore_exceptions(mut self) -> PredicateStage<T> {
        self.draft.exceptions = ExceptionPolicy::fail_fast();
        PredicateStage { draft: self.draft }
    }

    /// Fail-fast shortcut for [`PredicateStage::expecting`].
    pub fn expecting<F>(self, f: F) -> RetryStage<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.dont_ignore_exceptions().expecting(f)
    }

    /// Fail-fast shortcut for [`PredicateStage::expecting_that`].
    pub fn expecting_that(self, expectation: Expectation<T>) -> RetryStage<T> {
        self.dont_ignore_exceptions().expecting_that(expectation)
    }

    /// Fail-fast shortcut for [`PredicateStage::expecting_equals_to`].
    pub fn expecting_equals_to(self, other: T) -> RetryStage<T>
    where
        T: PartialEq + fmt::Debug + Sync,
    {
        self.dont_ignore_exceptions().expecting_equals_to(other)
    }
}

/// Second stage: choose the acceptance predicate.
pub struct PredicateStage<T> {
    draft: Draft<T>,
}

impl<T: Send + 'static> PredicateStage<T> {
    pub(crate) fn from_action(action: ActionStage<T>) -> Self {
        Self { draft: action.draft }
    }

    /// Accepts the values for which `f` holds.
    pub fn expecting<F>(self, f: F) -> RetryStage<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.expecting_that(Expectation::new("matches predicate", f))
    }

    /// Accepts the values for which `f` holds, described as `description`.
    pub fn expecting_described<F>(self, description: &str, f: F) -> RetryStage<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.expecting_that(Expectation::new(description, f))
    }

    /// Accepts the values `expectation` accepts.
    pub fn expecting_that(self, expectation: Expectation<T>) -> RetryStage<T> {
        RetryStage {
            draft: self.draft,
            expectation,
        }
    }

    /// Accepts values equal to `other`.
    pub fn expecting_equals_to(self, other: T) -> RetryStage<T>
    where
        T: PartialEq + fmt::Debug + Sync,
    {
        self.expecting_that(Expectation::equals_to(other))
    }

    /// Accepts the values for which `f` does not hold.
    pub fn expecting_not<F>(self, f: F) -> RetryStage<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.expecting_that(Expectation::not(Expectation::new("matches predicate", f)))
    }

    /// Accepts values at least one of `all` accepts.
    pub fn expecting_any_of(self, all: Vec<Expectation<T>>) -> RetryStage<T> {
        self.expecting_that(Expectation::any_of(all))
    }

    /// Accepts values every one of `all` accepts.
    pub fn expecting_all_of(self, all: Vec<Expectation<T>>) -> RetryStage<T> {
        self.expecting_that(Expectation::all_of(all))
    }
}

/// Third stage: choose the retry budget.
pub struct RetryStage<T> {
    draft: Draft<T>,
    expectation: Expectation<T>,
}

impl<T: Send + 'static> RetryStage<T> {
    /// Budget and waits from a complete policy.
    pub fn repeat(self, policy: RetryPolicy) -> ReadyStage<T> {
        ReadyStage {
            draft: self.draft,
            expectation: self.expectation,
            retry: policy,
        }
    }

    /// `count` attempts; the interval comes next.
    pub fn repeat_count(self, count: u32) -> IntervalStage<T> {
        IntervalStage {
            draft: self.draft,
            expectation: self.expectation,
            count,
        }
    }

    /// A single attempt.
    pub fn repeat_only_once(self) -> ReadyStage<T> {
        self.repeat(RetryPolicy::once())
    }

    /// Two attempts; the interval comes next.
    pub fn repeat_twice(self) -> IntervalStage<T> {
        self.repeat_count(2)
    }
}

/// Fourth stage: choose the wait between attempts.
pub struct IntervalStage<T> {
    draft: Draft<T>,
    expectation: Expectation<T>,
    count: u32,
}

impl<T: Send + 'static> IntervalStage<T> {
    /// Constant wait between attempts.
    pub fn every(self, wait: Duration) -> ReadyStage<T> {
        ReadyStage {
            retry: RetryPolicy::of(self.count, wait),
            draft: self.draft,
            expectation: self.expectation,
        }
    }

    /// Constant wait in milliseconds.
    pub fn every_ms(self, ms: u64) -> ReadyStage<T> {
        self.every(Duration::from_millis(ms))
    }

    /// One second between attempts.
    pub fn every_second(self) -> ReadyStage<T> {
        self.every(Duration::from_secs(1))
    }

    /// One minute between attempts.
    pub fn every_minute(self) -> ReadyStage<T> {
        self.every(Duration::from_secs(60))
    }

    /// One millisecond between attempts.
    pub fn as_fast_as_possible(self) -> ReadyStage<T> {
        self.every_ms(1)
    }
}

/// Last stage: fully configured, ready to resolve.
pub struct ReadyStage<T> {
    draft: Draft<T>,
    expectation: Expectation<T>,
    retry: RetryPolicy,
}

impl<T: Send + 'static> ReadyStage<T> {
    /// Adds a cleanup hook run once at the end of every resolution, after the
    /// outcome is known and before any handle completes.
    pub fn on_finish<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.draft.add_cleanup(Arc::new(hook));
        self
    }

    /// Publishes attempt and terminal events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.draft.bus = Some(bus);
        self
    }

    /// The configured retry policy.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Builds the engine.
    pub fn build(self) -> PollingEngine<T> {
        let mut engine = PollingEngine::new(
            AcceptingProbe::new(self.draft.probe, self.expectation),
            self.retry,
            self.draft.exceptions,
        );
        if let Some(bus) = self.draft.bus {
            engine = engine.with_bus(bus);
        }
        if let Some(hook) = self.draft.cleanup {
            engine = engine.with_cleanup(hook);
        }
        engine
    }

    /// Resolves on the calling thread; see [`PollingEngine::resolve`].
    pub fn resolve(self) -> Result<Option<T>, PollError> {
        self.build().resolve()
    }

    /// Resolves on the current async context.
    pub async fn resolve_async(self) -> Result<Option<T>, PollError> {
        self.build().resolve_async(&CancellationToken::new()).await
    }

    /// Asynchronous handle running on `executor`.
    pub fn using(self, executor: Executor) -> AsyncHandle<T> {
        AsyncHandle::new(self.build()).using(executor)
    }

    /// Asynchronous handle running on the shared executor.
    pub fn handle(self) -> AsyncHandle<T> {
        AsyncHandle::new(self.build())
    }

    /// Starts resolving on the shared executor right away.
    pub fn async_exec(self) -> Pending<T> {
        self.handle().start()
    }

    /// Resolves on the shared executor, blocking until the outcome is known.
    pub fn finish(self) -> Result<Option<T>, PollError> {
        self.handle().wait()
    }

    /// Like [`finish`](Self::finish), an empty outcome being [`PollError::NoResult`].
    pub fn finish_with_a_result(self) -> Result<T, PollError> {
        self.handle().wait_value()
    }
}

impl<T: 'static> fmt::Debug for ReadyStage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyStage")
            .field("probe", &self.draft.probe.name())
            .field("expectation", &format_args!("{}", self.expectation.description()))
            .field("retry", &self.retry)
            .field("exceptions", &self.draft.exceptions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::builder::WaitResult;
    use crate::error::BoxError;

    fn flaky(fail_first: u32) -> (ActionStage<String>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let stage = WaitResult::of_blocking("flaky", move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= fail_first {
                Err::<String, BoxError>(format!("not ready #{n}").into())
            } else {
                Ok("X".to_string())
            }
        });
        (stage, calls)
    }

    #[test]
    fn ignoring_failures_reaches_the_value() {
        let (stage, calls) = flaky(2);
        let out = stage
            .ignore_exception(false)
            .expecting_equals_to("X".to_string())
            .repeat_count(3)
            .every_ms(10)
            .resolve()
            .unwrap();
        assert_eq!(out.as_deref(), Some("X"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn fail_fast_shortcut_stops_at_first_failure() {
        let (stage, calls) = flaky(5);
        let err = stage
            .expecting(|_: &String| true)
            .repeat_count(5)
            .as_fast_as_possible()
            .resolve()
            .unwrap_err();
        assert!(err.qualification().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interval_shortcuts_build_constant_policies() {
        let (stage, _) = flaky(0);
        let ready = stage
            .ignore_exceptions()
            .expecting(|_: &String| true)
            .repeat_twice()
            .every_second();
        assert_eq!(ready.retry().count(), 2);
        assert_eq!(ready.retry().wait_before_attempt(2), Duration::from_secs(1));

        let (stage, _) = flaky(0);
        let ready = stage.ignore_exceptions().expecting(|_: &String| true).repeat_only_once();
        assert_eq!(ready.retry().count(), 1);
    }

    #[test]
    fn combinators_compose_predicates() {
        let (stage, _) = flaky(0);
        let out = stage
            .dont_ignore_exceptions()
            .expecting_all_of(vec![
                Expectation::new("non empty", |s: &String| !s.is_empty()),
                Expectation::not(Expectation::equals_to("Y".to_string())),
            ])
            .repeat_only_once()
            .resolve()
            .unwrap();
        assert_eq!(out.as_deref(), Some("X"));

        let (stage, _) = flaky(0);
        let out = stage
            .dont_ignore_exceptions()
            .expecting_not(|s: &String| s == "X")
            .repeat_twice()
            .every_ms(0)
            .resolve()
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn on_finish_hooks_run_once_each() {
        let ran = Arc::new(AtomicU32::new(0));
        let (a, b) = (Arc::clone(&ran), Arc::clone(&ran));
        let (stage, _) = flaky(0);
        let out = stage
            .ignore_exceptions()
            .expecting(|_: &String| true)
            .repeat_only_once()
            .on_finish(move || {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_finish(move || {
                b.fetch_add(10, Ordering::SeqCst);
            })
            .finish()
            .unwrap();
        assert_eq!(out.as_deref(), Some("X"));
        assert_eq!(ran.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn finish_with_a_result_reports_missing_value() {
        let (stage, _) = flaky(0);
        let err = stage
            .ignore_exceptions()
            .expecting(|_: &String| false)
            .repeat_twice()
            .every_ms(1)
            .finish_with_a_result()
            .unwrap_err();
        assert!(matches!(err, PollError::NoResult));
    }

    #[test]
    fn debug_names_the_configuration() {
        let (stage, _) = flaky(0);
        let ready = stage
            .ignore_exceptions()
            .expecting_equals_to("X".to_string())
            .repeat_only_once();
        let text = format!("{ready:?}");
        assert!(text.contains("flaky"));
        assert!(text.contains("is equal to \"X\""));
    }
}
