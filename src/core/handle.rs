//! # Asynchronous handles over a resolution.
//!
//! [`AsyncHandle`] is a reusable description of "resolve this engine on that
//! executor, within this deadline". [`AsyncHandle::start`] schedules one
//! resolution and returns a [`Pending`] for it:
//!
//! ```text
//! AsyncHandle ──start()──► spawn(worker) ──► Pending
//!                                │              ├─ cancel()      → token fires, worker unwinds
//!                                │              ├─ is_finished()
//!                                │              ├─ wait() / .await
//!                                ▼              └─ wait_value()  → empty = NoResult
//!              select! { resolution, cancellation, deadline }
//! ```
//!
//! ## Rules
//! - The probe is never invoked on the caller's thread.
//! - Continuations ([`map`](AsyncHandle::map), [`filter`](AsyncHandle::filter), ...)
//!   run on the worker once the resolution is known; they never re-invoke the probe.
//! - The deadline covers the whole resolution. When it is exceeded the
//!   resolution is dropped (its cleanup runs) and the outcome is
//!   [`PollError::TimedOut`].
//! - A cancelled [`Pending`] always reports [`PollError::Canceled`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::{select, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{config::Config, engine::PollingEngine, executor::Executor},
    error::PollError,
    events::{Bus, Event, EventKind},
};

type Outcome<T> = Result<Option<T>, PollError>;
type Resolver<T> = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Outcome<T>> + Send + Sync>;

/// Reusable asynchronous view of a resolution.
pub struct AsyncHandle<T> {
    name: Arc<str>,
    resolver: Resolver<T>,
    executor: Executor,
    timeout: Option<Duration>,
    bus: Option<Bus>,
}

impl<T> Clone for AsyncHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            resolver: Arc::clone(&self.resolver),
            executor: self.executor.clone(),
            timeout: self.timeout,
            bus: self.bus.clone(),
        }
    }
}

impl<T> fmt::Debug for AsyncHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("name", &self.name)
            .field("executor", &self.executor)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<T: Send + 'static> AsyncHandle<T> {
    /// Wraps an engine, running on the shared executor without deadline.
    pub fn new(engine: PollingEngine<T>) -> Self {
        Self::from_engine(Arc::new(engine))
    }

    /// Wraps a shared engine.
    pub fn from_engine(engine: Arc<PollingEngine<T>>) -> Self {
        let name: Arc<str> = Arc::from(engine.name());
        let bus = engine.bus().cloned();
        let resolver: Resolver<T> = Arc::new(move |ctx: CancellationToken| {
            let engine = Arc::clone(&engine);
            Box::pin(async move { engine.resolve_async(&ctx).await })
        });
        Self {
            name,
            resolver,
            executor: Executor::default(),
            timeout: None,
            bus,
        }
    }

    /// Runs on `executor`.
    pub fn using(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// Overall deadline of each resolution started from this handle.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Applies the handle defaults of `cfg` (deadline). A zero timeout keeps
    /// the current one.
    pub fn with_config(mut self, cfg: &Config) -> Self {
        if let Some(timeout) = cfg.default_timeout() {
            self.timeout = Some(timeout);
        }
        self
    }

    /// Name of the underlying probe.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The overall deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Schedules one resolution on the executor.
    pub fn start(&self) -> Pending<T> {
        let token = CancellationToken::new();
        let handle = match self.executor.handle() {
            Ok(handle) => handle,
            Err(e) => return Pending::failed(token, e),
        };

        let resolution = (self.resolver)(token.clone());
        let worker = Worker {
            token: token.clone(),
            timeout: self.timeout,
            bus: self.bus.clone(),
            name: Arc::clone(&self.name),
        };
        let join = handle.spawn(worker.run(resolution));
        Pending {
            token,
            state: PendingState::Running(join),
        }
    }

    /// Starts a resolution and blocks until it ends.
    ///
    /// Must not be called from a thread driving a current-thread runtime.
    pub fn wait(&self) -> Outcome<T> {
        self.start().wait()
    }

    /// Like [`wait`](Self::wait), an empty outcome being [`PollError::NoResult`].
    pub fn wait_value(&self) -> Result<T, PollError> {
        self.start().wait_value()
    }

    /// Starts a resolution and awaits it.
    pub async fn resolved(&self) -> Outcome<T> {
        self.start().await
    }

    /// Like [`resolved`](Self::resolved), an empty outcome being [`PollError::NoResult`].
    pub async fn resolved_value(&self) -> Result<T, PollError> {
        self.start().await?.ok_or(PollError::NoResult)
    }

    /// Transforms the accepted value.
    pub fn map<U, F>(self, f: F) -> AsyncHandle<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.then(move |out| out.map(|v| v.map(&f)))
    }

    /// Transforms the accepted value, possibly into an empty outcome.
    pub fn flat_map<U, F>(self, f: F) -> AsyncHandle<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        self.then(move |out| out.map(|v| v.and_then(&f)))
    }

    /// Keeps the accepted value only if `f` holds.
    pub fn filter<F>(self, f: F) -> AsyncHandle<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.then(move |out| out.map(|v| v.filter(|v| f(v))))
    }

    /// Replaces an empty outcome with `f()`.
    pub fn or_else<F>(self, f: F) -> AsyncHandle<T>
    where
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        self.then(move |out| out.map(|v| v.or_else(&f)))
    }

    /// Observes the outcome without changing it.
    pub fn on_completion<F>(self, f: F) -> AsyncHandle<T>
    where
        F: Fn(&Outcome<T>) + Send + Sync + 'static,
    {
        self.then(move |out| {
            f(&out);
            out
        })
    }

    fn then<U, G>(self, g: G) -> AsyncHandle<U>
    where
        U: Send + 'static,
        G: Fn(Outcome<T>) -> Outcome<U> + Send + Sync + 'static,
    {
        let inner = self.resolver;
        let g = Arc::new(g);
        let resolver: Resolver<U> = Arc::new(move |ctx: CancellationToken| {
            let resolution = inner(ctx);
            let g = Arc::clone(&g);
            Box::pin(async move { g(resolution.await) })
        });
        AsyncHandle {
            name: self.name,
            resolver,
            executor: self.executor,
            timeout: self.timeout,
            bus: self.bus,
        }
    }
}

/// State moved into the spawned task.
struct Worker {
    token: CancellationToken,
    timeout: Option<Duration>,
    bus: Option<Bus>,
    name: Arc<str>,
}

impl Worker {
    async fn run<T>(self, resolution: BoxFuture<'static, Outcome<T>>) -> Outcome<T> {
        let deadline = async {
            match self.timeout {
                Some(limit) => time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let mut resolution = resolution;

        select! {
            biased;
            out = &mut resolution => out,
            _ = self.token.cancelled() => Err(PollError::Canceled),
            _ = &mut deadline => {
                drop(resolution);
                let timeout = self.timeout.unwrap_or_default();
                if let Some(bus) = &self.bus {
                    bus.publish(
                        Event::new(EventKind::TimeoutHit)
                            .with_probe(Arc::clone(&self.name))
                            .with_timeout(timeout),
                    );
                }
                Err(PollError::TimedOut { timeout })
            }
        }
    }
}

/// One scheduled resolution.
///
/// Dropping a `Pending` detaches the resolution; call [`cancel`](Self::cancel)
/// to stop it.
pub struct Pending<T> {
    token: CancellationToken,
    state: PendingState<T>,
}

enum PendingState<T> {
    Running(JoinHandle<Outcome<T>>),
    Failed(PollError),
    Done,
}

impl<T> Pending<T> {
    fn failed(token: CancellationToken, e: PollError) -> Self {
        Self {
            token,
            state: PendingState::Failed(e),
        }
    }

    /// Requests cancellation of the in-flight resolution.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelling this resolution.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// True once the outcome is available.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PendingState::Running(join) => join.is_finished(),
            PendingState::Failed(_) | PendingState::Done => true,
        }
    }

    /// Blocks the calling thread until the outcome is available.
    ///
    /// Must not be called from a thread driving a current-thread runtime.
    pub fn wait(self) -> Outcome<T> {
        futures::executor::block_on(self)
    }

    /// Like [`wait`](Self::wait), an empty outcome being [`PollError::NoResult`].
    pub fn wait_value(self) -> Result<T, PollError> {
        self.wait()?.ok_or(PollError::NoResult)
    }

    fn settle(&self, out: Outcome<T>) -> Outcome<T> {
        if self.token.is_cancelled() {
            Err(PollError::Canceled)
        } else {
            out
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let out = match std::mem::replace(&mut this.state, PendingState::Done) {
            PendingState::Running(mut join) => match Pin::new(&mut join).poll(cx) {
                Poll::Pending => {
                    this.state = PendingState::Running(join);
                    return Poll::Pending;
                }
                Poll::Ready(Ok(out)) => out,
                Poll::Ready(Err(e)) if e.is_cancelled() => Err(PollError::Canceled),
                Poll::Ready(Err(e)) => Err(PollError::Worker {
                    error: e.to_string(),
                }),
            },
            PendingState::Failed(e) => return Poll::Ready(Err(e)),
            PendingState::Done => {
                return Poll::Ready(Err(PollError::Worker {
                    error: "resolution polled after completion".to_string(),
                }));
            }
        };
        Poll::Ready(this.settle(out))
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use crate::error::BoxError;
    use crate::policies::{ExceptionPolicy, RetryPolicy};
    use crate::probes::{AcceptingProbe, Expectation, ProbeFn};

    fn handle(
        value: u32,
        accept: bool,
        retry: RetryPolicy,
        calls: &Arc<AtomicU32>,
        cleanup: &Arc<AtomicU32>,
    ) -> AsyncHandle<u32> {
        let c = Arc::clone(calls);
        let probe = ProbeFn::arc("fixed", move |_ctx: CancellationToken| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<u32, BoxError>(value) }
        });
        let done = Arc::clone(cleanup);
        let engine = PollingEngine::new(
            AcceptingProbe::new(probe, Expectation::new("configured", move |_| accept)),
            retry,
            ExceptionPolicy::default(),
        )
        .with_cleanup(Arc::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }));
        AsyncHandle::new(engine)
    }

    fn counters() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    #[tokio::test]
    async fn resolves_on_the_current_runtime() {
        let (calls, cleanup) = counters();
        let h = handle(7, true, RetryPolicy::once(), &calls, &cleanup).using(Executor::current());
        assert_eq!(h.resolved().await.unwrap(), Some(7));
        assert_eq!(cleanup.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_wait_on_shared_executor() {
        let (calls, cleanup) = counters();
        let h = handle(7, true, RetryPolicy::once(), &calls, &cleanup);
        assert_eq!(h.wait_value().unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_executor_drives_tokio_io() {
        let probe = ProbeFn::arc("tcp", |_ctx: CancellationToken| async {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            tokio::net::TcpStream::connect(listener.local_addr()?).await?;
            Ok::<_, BoxError>(1u32)
        });
        let engine = PollingEngine::new(
            AcceptingProbe::new(probe, Expectation::any()),
            RetryPolicy::once(),
            ExceptionPolicy::default(),
        );
        assert_eq!(AsyncHandle::new(engine).wait_value().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_outcome_is_no_result_for_value_accessors() {
        let (calls, cleanup) = counters();
        let h = handle(7, false, RetryPolicy::of_ms(2, 1), &calls, &cleanup)
            .using(Executor::current());
        assert_eq!(h.resolved().await.unwrap(), None);
        assert!(matches!(h.resolved_value().await, Err(PollError::NoResult)));
    }

    #[tokio::test]
    async fn cancel_stops_a_long_wait() {
        let (calls, cleanup) = counters();
        let h = handle(7, false, RetryPolicy::of(100, Duration::from_secs(60)), &calls, &cleanup)
            .using(Executor::current());

        let pending = h.start();
        time::sleep(Duration::from_millis(50)).await;
        let start = Instant::now();
        pending.cancel();
        let out = pending.await;

        assert!(matches!(out, Err(PollError::Canceled)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cleanup.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_covers_the_whole_resolution() {
        let (calls, cleanup) = counters();
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let retry = RetryPolicy::of(100, Duration::from_millis(50));
        let mut h = handle(7, false, retry, &calls, &cleanup)
            .using(Executor::current())
            .with_timeout(Duration::from_millis(120));
        h.bus = Some(bus);

        let out = h.resolved().await;
        assert!(matches!(out, Err(PollError::TimedOut { .. })));
        assert!(calls.load(Ordering::SeqCst) < 100);
        assert_eq!(cleanup.load(Ordering::SeqCst), 1);

        let mut saw_timeout = false;
        while let Ok(ev) = rx.try_recv() {
            saw_timeout |= ev.kind == EventKind::TimeoutHit;
        }
        assert!(saw_timeout);
    }

    #[tokio::test]
    async fn continuations_do_not_reinvoke_the_probe() {
        let (calls, cleanup) = counters();
        let h = handle(21, true, RetryPolicy::once(), &calls, &cleanup)
            .using(Executor::current())
            .map(|v| v * 2)
            .filter(|v| *v > 40)
            .flat_map(|v| Some(format!("{v}")));

        assert_eq!(h.resolved_value().await.unwrap(), "42");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejecting_filter_empties_the_outcome() {
        let (calls, cleanup) = counters();
        let h = handle(21, true, RetryPolicy::of_ms(3, 1), &calls, &cleanup)
            .using(Executor::current())
            .map(|v| v * 2)
            .filter(|v| *v > 100);

        assert_eq!(h.resolved().await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_wait_sees_cancel_from_another_thread() {
        let (calls, cleanup) = counters();
        let h = handle(7, false, RetryPolicy::of(100, Duration::from_secs(60)), &calls, &cleanup);

        let pending = h.start();
        let token = pending.cancellation_token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let start = Instant::now();
        let out = pending.wait();
        canceller.join().unwrap();

        assert!(matches!(out, Err(PollError::Canceled)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(cleanup.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn or_else_fills_an_empty_outcome() {
        let (calls, cleanup) = counters();
        let seen = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&seen);
        let h = handle(1, false, RetryPolicy::once(), &calls, &cleanup)
            .using(Executor::current())
            .or_else(|| Some(99))
            .on_completion(move |out| {
                if let Ok(Some(v)) = out {
                    s.store(*v, Ordering::SeqCst);
                }
            });

        assert_eq!(h.resolved().await.unwrap(), Some(99));
        assert_eq!(seen.load(Ordering::SeqCst), 99);
    }

    #[tokio::test]
    async fn failures_pass_through_continuations() {
        let probe = ProbeFn::arc("down", |_ctx: CancellationToken| async {
            Err::<u32, BoxError>("down".into())
        });
        let engine = PollingEngine::new(
            AcceptingProbe::new(probe, Expectation::any()),
            RetryPolicy::once(),
            ExceptionPolicy::default(),
        );
        let h = AsyncHandle::new(engine).using(Executor::current()).map(|v| v + 1);
        let err = h.resolved().await.unwrap_err();
        assert!(err.qualification().is_some());
    }

    #[tokio::test]
    async fn config_sets_the_deadline() {
        let (calls, cleanup) = counters();
        let cfg = Config {
            timeout: Duration::from_secs(2),
            ..Config::default()
        };
        let h = handle(1, true, RetryPolicy::once(), &calls, &cleanup).with_config(&cfg);
        assert_eq!(h.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn zero_config_timeout_keeps_the_explicit_one() {
        let (calls, cleanup) = counters();
        let h = handle(1, true, RetryPolicy::once(), &calls, &cleanup)
            .with_timeout(Duration::from_secs(3))
            .with_config(&Config::default());
        assert_eq!(h.timeout(), Some(Duration::from_secs(3)));
    }
}
