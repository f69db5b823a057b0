//! # Entry points of the builder.
//!
//! ```rust
//! use pollvisor::WaitResult;
//!
//! let out = WaitResult::of_blocking("answer", || Ok::<_, std::io::Error>(42))
//!     .expecting(|v| *v == 42)
//!     .repeat_count(3)
//!     .every_ms(10)
//!     .resolve()
//!     .unwrap();
//! assert_eq!(out, Some(42));
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::builder::stages::{ActionStage, PredicateStage, RetryStage};
use crate::error::BoxError;
use crate::probes::{BlockingProbe, Expectation, ProbeFn, ProbeRef};

/// Factories for the first builder stage.
#[derive(Debug, Clone, Copy)]
pub struct WaitResult;

impl WaitResult {
    /// Polls an existing probe.
    pub fn of<T: Send + 'static>(probe: ProbeRef<T>) -> ActionStage<T> {
        ActionStage::new(probe)
    }

    /// Polls an async closure; each attempt calls it once.
    pub fn of_fn<T, E, F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> ActionStage<T>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        ActionStage::new(ProbeFn::arc(name, f))
    }

    /// Polls a synchronous closure on the blocking pool.
    pub fn of_blocking<T, E, F>(name: impl Into<Cow<'static, str>>, f: F) -> ActionStage<T>
    where
        T: Send + 'static,
        E: Into<BoxError> + 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        ActionStage::new(BlockingProbe::arc(name, f))
    }

    /// Polls a shared value until the predicate accepts it.
    ///
    /// The value is usually something the caller mutates concurrently (atomics, locks).
    pub fn on<M>(value: Arc<M>) -> PredicateStage<Arc<M>>
    where
        M: Send + Sync + 'static,
    {
        let probe = ProbeFn::arc("shared value", move |_ctx: CancellationToken| {
            let value = Arc::clone(&value);
            async move { Ok::<_, BoxError>(value) }
        });
        PredicateStage::from_action(ActionStage::new(probe))
    }

    /// Polls a condition until it holds.
    pub fn on_condition<F>(condition: F) -> RetryStage<bool>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        ActionStage::new(BlockingProbe::arc("condition", move || Ok::<_, BoxError>(condition())))
            .dont_ignore_exceptions()
            .expecting_that(Expectation::new("is true", |b: &bool| *b))
    }

    /// Runs `action` until it completes without error.
    pub fn of_runnable<E, F>(action: F) -> RetryStage<bool>
    where
        E: Into<BoxError> + 'static,
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
    {
        ActionStage::new(BlockingProbe::arc("runnable", move || action().map(|()| true)))
            .ignore_exceptions()
            .expecting_that(Expectation::new("is true", |b: &bool| *b))
    }
}
