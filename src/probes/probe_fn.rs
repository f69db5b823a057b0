//! # Function-backed probes.
//!
//! - [`ProbeFn`] wraps `F: Fn(CancellationToken) -> Fut`, producing a fresh
//!   future per attempt.
//! - [`BlockingProbe`] wraps a synchronous `F: Fn() -> Result<T, E>` and runs
//!   each call on tokio's blocking pool, so slow probes do not stall the worker.
//!
//! Neither keeps hidden state between attempts; shared state goes through an
//! explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use pollvisor::{BoxError, Probe, ProbeFn, ProbeRef};
//!
//! let p: ProbeRef<u32> = ProbeFn::arc("answer", |_ctx: CancellationToken| async {
//!     Ok::<_, BoxError>(42)
//! });
//! assert_eq!(p.name(), "answer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::probes::probe::{BoxProbeFuture, Probe};

/// Async-closure probe.
#[derive(Debug)]
pub struct ProbeFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ProbeFn<F> {
    /// Creates a new function-backed probe.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the probe and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<T, E, F, Fut> Probe<T> for ProbeFn<F>
where
    T: Send + 'static,
    E: Into<BoxError> + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, ctx: CancellationToken) -> BoxProbeFuture<T> {
        let fut = (self.f)(ctx);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

/// Synchronous-closure probe, executed on the blocking pool.
pub struct BlockingProbe<F> {
    name: Cow<'static, str>,
    f: Arc<F>,
}

impl<F> BlockingProbe<F> {
    /// Creates a new blocking probe.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Creates the probe and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for BlockingProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingProbe").field("name", &self.name).finish()
    }
}

impl<T, E, F> Probe<T> for BlockingProbe<F>
where
    T: Send + 'static,
    E: Into<BoxError> + 'static,
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, _ctx: CancellationToken) -> BoxProbeFuture<T> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f().map_err(Into::into)).await {
                Ok(res) => res,
                Err(join) => Err(BoxError::from(format!("blocking probe aborted: {join}"))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn probe_fn_creates_fresh_future_per_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let probe = ProbeFn::new("count", move |_ctx: CancellationToken| {
            let c = Arc::clone(&c);
            async move { Ok::<_, BoxError>(c.fetch_add(1, Ordering::SeqCst) + 1) }
        });

        assert_eq!(probe.attempt(CancellationToken::new()).await.unwrap(), 1);
        assert_eq!(probe.attempt(CancellationToken::new()).await.unwrap(), 2);
        assert_eq!(Probe::<u32>::name(&probe), "count");
    }

    #[tokio::test]
    async fn blocking_probe_propagates_errors() {
        let probe = BlockingProbe::new("fails", || Err::<u8, _>("not yet"));
        let err = probe.attempt(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "not yet");
    }

    #[tokio::test]
    async fn blocking_probe_runs_closure() {
        let probe = BlockingProbe::new("value", || Ok::<_, BoxError>("ready".to_string()));
        assert_eq!(probe.attempt(CancellationToken::new()).await.unwrap(), "ready");
    }
}
