//! # Probe abstractions.
//!
//! This module provides the probe-related types:
//! - [`Probe`] - trait for implementing cancelable, fallible attempts
//! - [`ProbeFn`] / [`BlockingProbe`] - closure-backed probes (async / blocking)
//! - [`ProbeRef`] - shared reference to a probe (`Arc<dyn Probe<T>>`)
//! - [`Expectation`] - described acceptance predicate
//! - [`AcceptingProbe`] - probe with its predicate folded in

mod accepting;
mod probe;
mod probe_fn;

pub use accepting::{AcceptingProbe, Expectation};
pub use probe::{BoxProbeFuture, Probe, ProbeRef};
pub use probe_fn::{BlockingProbe, ProbeFn};
