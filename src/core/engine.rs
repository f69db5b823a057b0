//! # PollingEngine: one complete resolution.
//!
//! Combines an [`AcceptingProbe`], a [`RetryPolicy`] and an [`ExceptionPolicy`]
//! into the operation that produces the final outcome:
//!
//! ```text
//! loop ProbeExecution::next()
//!   ├─ accepted           → Ok(Some(value))
//!   ├─ failed + fail-fast → Err(Qualification(Intermediate))
//!   └─ rejected / failed (ignored) → next
//! budget spent
//!   ├─ last attempt failed + strict final → Err(Qualification(Exhausted))
//!   └─ otherwise                          → Ok(None)
//! ```
//!
//! ## Rules
//! - The cleanup hook runs **exactly once** per resolution and on every path:
//!   value, empty, qualification failure, cancellation (including the
//!   resolution future being dropped mid-flight).
//! - Cancellation is never converted into an empty result.
//! - [`PollingEngine::resolve`] blocks the calling thread. Outside tokio it
//!   drives a private current-thread runtime; on a multi-thread runtime it
//!   uses `block_in_place`; on a current-thread runtime it refuses with
//!   [`PollError::Worker`] (use [`PollingEngine::resolve_async`] there).

use std::fmt;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

use crate::{
    core::execution::ProbeExecution,
    error::{PollError, QualificationError},
    events::{Bus, Event, EventKind},
    policies::{ExceptionPolicy, RetryPolicy},
    probes::AcceptingProbe,
};

/// Cleanup hook run once at the end of every resolution.
pub type CleanupFn = Arc<dyn Fn() + Send + Sync>;

/// Retry loop plus exception handling over one probe.
pub struct PollingEngine<T> {
    probe: AcceptingProbe<T>,
    retry: RetryPolicy,
    exceptions: ExceptionPolicy,
    bus: Option<Bus>,
    cleanup: Option<CleanupFn>,
}

impl<T: Send + 'static> PollingEngine<T> {
    /// Creates an engine without event bus nor cleanup hook.
    pub fn new(probe: AcceptingProbe<T>, retry: RetryPolicy, exceptions: ExceptionPolicy) -> Self {
        Self {
            probe,
            retry,
            exceptions,
            bus: None,
            cleanup: None,
        }
    }

    /// Publishes attempt and terminal events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers the cleanup hook, replacing a previous one.
    pub fn with_cleanup(mut self, hook: CleanupFn) -> Self {
        self.cleanup = Some(hook);
        self
    }

    /// Name of the underlying probe.
    pub fn name(&self) -> &str {
        self.probe.name()
    }

    /// The retry budget.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The exception policy.
    pub fn exceptions(&self) -> ExceptionPolicy {
        self.exceptions
    }

    /// The bus events go to, if any.
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    /// Runs one resolution on the current async context.
    pub async fn resolve_async(&self, ctx: &CancellationToken) -> Result<Option<T>, PollError> {
        let _cleanup = CleanupGuard {
            hook: self.cleanup.clone(),
            bus: self.bus.as_ref(),
            probe: self.probe.name(),
        };
        let mut exec = ProbeExecution::new(&self.probe, &self.retry, self.bus.as_ref());

        loop {
            match exec.next(ctx).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    self.publish(
                        Event::new(EventKind::ResolutionCanceled).with_attempt(exec.attempts()),
                    );
                    return Err(e);
                }
            }

            if exec.result().is_some() {
                return Ok(exec.take_result());
            }
            if let Some(failure) = exec.last_error() {
                self.exceptions
                    .on_attempt_exception(exec.attempts(), failure)
                    .into_result()
                    .map_err(|e| self.qualification_failed(e))?;
            }
        }

        self.exceptions
            .on_exhaustion_exception(exec.attempts(), exec.last_error())
            .into_result()
            .map_err(|e| self.qualification_failed(e))?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            probe = self.probe.name(),
            attempts = exec.attempts(),
            "retry budget exhausted"
        );
        self.publish(Event::new(EventKind::Exhausted).with_attempt(exec.attempts()));
        Ok(None)
    }

    /// Runs one resolution, blocking the calling thread until it ends.
    pub fn resolve(&self) -> Result<Option<T>, PollError> {
        self.resolve_cancellable(&CancellationToken::new())
    }

    /// Blocking resolution that stops early when `ctx` is cancelled from another thread.
    ///
    /// Inside a multi-thread tokio runtime the loop runs on the ambient runtime
    /// through [`block_in_place`](tokio::task::block_in_place); inside a
    /// current-thread runtime it fails with [`PollError::Worker`].
    pub fn resolve_cancellable(&self, ctx: &CancellationToken) -> Result<Option<T>, PollError> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.resolve_async(ctx)))
            }
            Ok(_) => Err(PollError::Worker {
                error: "blocking resolve on a current-thread runtime, use resolve_async"
                    .to_string(),
            }),
            Err(_) => {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| PollError::Worker {
                        error: e.to_string(),
                    })?;
                let out = rt.block_on(self.resolve_async(ctx));
                rt.shutdown_background();
                out
            }
        }
    }

    fn qualification_failed(&self, e: QualificationError) -> PollError {
        #[cfg(feature = "logging")]
        tracing::debug!(
            probe = self.probe.name(),
            attempt = e.attempt(),
            stage = ?e.stage(),
            "qualification failed"
        );
        self.publish(
            Event::new(EventKind::QualificationFailed)
                .with_attempt(e.attempt())
                .with_stage(e.stage())
                .with_reason(e.cause().to_string()),
        );
        PollError::Qualification(e)
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_probe(self.probe.name()));
        }
    }
}

impl<T: 'static> fmt::Debug for PollingEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingEngine")
            .field("probe", &self.probe)
            .field("retry", &self.retry)
            .field("exceptions", &self.exceptions)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Runs the hook when the resolution future completes or is dropped.
struct CleanupGuard<'a> {
    hook: Option<CleanupFn>,
    bus: Option<&'a Bus>,
    probe: &'a str,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
            if let Some(bus) = self.bus {
                bus.publish(Event::new(EventKind::CleanupRan).with_probe(self.probe));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use crate::error::{BoxError, Stage};
    use crate::probes::{Expectation, ProbeFn, ProbeRef};

    fn counting<F>(f: F) -> (ProbeRef<String>, Arc<AtomicU32>)
    where
        F: Fn(u32) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let f = Arc::new(f);
        let probe: ProbeRef<String> = ProbeFn::arc("counting", move |_ctx: CancellationToken| {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            let f = Arc::clone(&f);
            async move { f(n) }
        });
        (probe, calls)
    }

    fn engine(
        probe: ProbeRef<String>,
        expectation: Expectation<String>,
        retry: RetryPolicy,
        exceptions: ExceptionPolicy,
    ) -> PollingEngine<String> {
        PollingEngine::new(AcceptingProbe::new(probe, expectation), retry, exceptions)
    }

    fn never() -> Expectation<String> {
        Expectation::new("never", |_: &String| false)
    }

    #[tokio::test]
    async fn accepted_first_attempt_stops_the_loop() {
        let (probe, calls) = counting(|_| Ok("X".into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(5, 1000),
            ExceptionPolicy::default(),
        );

        let start = Instant::now();
        let out = e.resolve_async(&CancellationToken::new()).await.unwrap();
        assert_eq!(out.as_deref(), Some("X"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn never_more_than_count_attempts() {
        let (probe, calls) = counting(|_| Ok("no".into()));
        let e = engine(probe, never(), RetryPolicy::of_ms(4, 1), ExceptionPolicy::default());

        let out = e.resolve_async(&CancellationToken::new()).await.unwrap();
        assert!(out.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_count_is_empty_without_calls() {
        let (probe, calls) = counting(|_| Ok("X".into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(0, 1),
            ExceptionPolicy::default(),
        );

        assert!(e.resolve_async(&CancellationToken::new()).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fail_fast_stops_after_first_failure() {
        let (probe, calls) = counting(|_| Err("down".into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(5, 1),
            ExceptionPolicy::fail_fast(),
        );

        let err = e.resolve_async(&CancellationToken::new()).await.unwrap_err();
        let q = err.qualification().expect("qualification error");
        assert_eq!(q.stage(), Stage::Intermediate);
        assert_eq!(q.cause().to_string(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ignoring_everything_yields_empty_after_budget() {
        let (probe, calls) = counting(|_| Err("down".into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(3, 1),
            ExceptionPolicy::ignoring(true),
        );

        assert!(e.resolve_async(&CancellationToken::new()).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn strict_final_surfaces_last_failure() {
        let (probe, calls) = counting(|n| Err(format!("down #{n}").into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(3, 1),
            ExceptionPolicy::ignoring(false),
        );

        let err = e.resolve_async(&CancellationToken::new()).await.unwrap_err();
        let q = err.qualification().expect("qualification error");
        assert_eq!(q.stage(), Stage::Final);
        assert_eq!(q.attempt(), 3);
        assert_eq!(q.cause().to_string(), "down #3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn strict_final_ignores_recovered_failures() {
        let (probe, _) = counting(|n| {
            if n == 1 {
                Err("flaky".into())
            } else {
                Ok("no".into())
            }
        });
        let e = engine(probe, never(), RetryPolicy::of_ms(2, 1), ExceptionPolicy::ignoring(false));

        assert!(e.resolve_async(&CancellationToken::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn value_after_two_failures() {
        let (probe, calls) = counting(|n| {
            if n < 3 {
                Err("not yet".into())
            } else {
                Ok("X".into())
            }
        });
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(3, 10),
            ExceptionPolicy::ignoring(false),
        );

        let start = Instant::now();
        let out = e.resolve_async(&CancellationToken::new()).await.unwrap();
        assert_eq!(out.as_deref(), Some("X"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocking_resolve_runs_on_private_runtime() {
        let (probe, calls) = counting(|n| Ok(format!("v{n}")));
        let e = engine(
            probe,
            Expectation::equals_to("v2".to_string()),
            RetryPolicy::of_ms(2, 0),
            ExceptionPolicy::default(),
        );
        assert_eq!(e.resolve().unwrap().as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn constant_waits_stay_close_to_their_sum() {
        let (probe, calls) = counting(|_| Ok("no".into()));
        let e = engine(probe, never(), RetryPolicy::of_ms(4, 20), ExceptionPolicy::default());

        let start = Instant::now();
        assert!(e.resolve_async(&CancellationToken::new()).await.unwrap().is_none());
        let elapsed = start.elapsed();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(60 + 250), "took {elapsed:?}");
    }

    #[test]
    fn blocking_resolve_supports_tokio_io() {
        let probe: ProbeRef<bool> = ProbeFn::arc("tcp", |_ctx: CancellationToken| async {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            tokio::net::TcpStream::connect(addr).await?;
            Ok::<_, BoxError>(true)
        });
        let e = PollingEngine::new(
            AcceptingProbe::new(probe, Expectation::new("connected", |b: &bool| *b)),
            RetryPolicy::once(),
            ExceptionPolicy::default(),
        );
        assert_eq!(e.resolve().unwrap(), Some(true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_resolve_inside_multi_thread_runtime() {
        let (probe, calls) = counting(|n| Ok(format!("v{n}")));
        let e = engine(
            probe,
            Expectation::equals_to("v2".to_string()),
            RetryPolicy::of_ms(3, 1),
            ExceptionPolicy::default(),
        );
        assert_eq!(e.resolve().unwrap().as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blocking_resolve_refuses_current_thread_runtime() {
        let (probe, calls) = counting(|_| Ok("X".into()));
        let e = engine(probe, Expectation::any(), RetryPolicy::once(), ExceptionPolicy::default());
        assert!(matches!(e.resolve(), Err(PollError::Worker { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_lists_probe_and_expectation() {
        let (probe, _) = counting(|_| Ok("X".into()));
        let e = engine(
            probe,
            Expectation::equals_to("X".to_string()),
            RetryPolicy::once(),
            ExceptionPolicy::default(),
        );
        let text = format!("{e:?}");
        assert!(text.contains("counting"));
        assert!(text.contains("is equal to \"X\""));
        assert!(!text.contains("\\\""));
    }

    #[tokio::test]
    async fn cleanup_runs_once_on_each_path() {
        let ran = Arc::new(AtomicU32::new(0));
        let hook = {
            let ran = Arc::clone(&ran);
            Arc::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }) as CleanupFn
        };

        let (probe, _) = counting(|_| Ok("X".into()));
        let ok = engine(probe, Expectation::any(), RetryPolicy::once(), ExceptionPolicy::default())
            .with_cleanup(Arc::clone(&hook));
        ok.resolve_async(&CancellationToken::new()).await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let (probe, _) = counting(|_| Err("down".into()));
        let failing = engine(
            probe,
            Expectation::any(),
            RetryPolicy::once(),
            ExceptionPolicy::default(),
        )
            .with_cleanup(Arc::clone(&hook));
        assert!(failing.resolve_async(&CancellationToken::new()).await.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 2);

        let (probe, _) = counting(|_| Ok("no".into()));
        let slow = engine(
            probe,
            never(),
            RetryPolicy::of(10,
            Duration::from_secs(30)),
            ExceptionPolicy::default(),
        )
            .with_cleanup(hook);
        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = slow.resolve_async(&ctx).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_events_reach_the_bus() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let (probe, _) = counting(|_| Err("down".into()));
        let e = engine(
            probe,
            Expectation::any(),
            RetryPolicy::of_ms(2, 1),
            ExceptionPolicy::ignoring(false),
        )
            .with_bus(bus)
            .with_cleanup(Arc::new(|| {}));

        assert!(e.resolve_async(&CancellationToken::new()).await.is_err());

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::QualificationFailed));
        assert_eq!(kinds.last(), Some(&EventKind::CleanupRan));
    }
}
