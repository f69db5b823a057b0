//! # Probe abstraction.
//!
//! This module defines the [`Probe`] trait: a named, cancelable, fallible
//! operation that the engine calls once per attempt. The common handle type is
//! [`ProbeRef`], an `Arc<dyn Probe<T>>` suitable for sharing between the engine
//! and the worker running it.
//!
//! A probe receives a [`CancellationToken`] and may check it to stop early; the
//! engine also drops the in-flight attempt future when the resolution is
//! cancelled.
//!
//! ## Shared state
//! Probes may wrap caller-owned mutable state (an `Arc<Mutex<..>>`, a directory
//! watch). The engine never synchronizes access to it; keeping that state
//! thread-safe is the caller's responsibility.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// Boxed future returned by [`Probe::attempt`].
pub type BoxProbeFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send + 'static>>;

/// Shared handle to a probe.
pub type ProbeRef<T> = Arc<dyn Probe<T>>;

/// # Fallible operation polled by the engine.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use pollvisor::{BoxProbeFuture, Probe};
///
/// struct Counter;
///
/// impl Probe<u32> for Counter {
///     fn name(&self) -> &str { "counter" }
///
///     fn attempt(&self, _ctx: CancellationToken) -> BoxProbeFuture<u32> {
///         Box::pin(async { Ok(42) })
///     }
/// }
/// ```
pub trait Probe<T>: Send + Sync + 'static {
    /// Returns a stable, human-readable probe name.
    fn name(&self) -> &str;

    /// Creates the future of one attempt.
    fn attempt(&self, ctx: CancellationToken) -> BoxProbeFuture<T>;
}
