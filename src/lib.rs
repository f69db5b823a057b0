//! # pollvisor
//!
//! **Pollvisor** repeats a fallible probe until its result is accepted, the
//! retry budget runs out, or the caller gives up.
//!
//! It provides a staged builder to describe *what* to poll, *when* a result
//! is good enough, *how often* to try and *how long* to wait, a retry engine
//! that runs the description on the calling thread or on a tokio runtime, and
//! an event bus to observe every attempt.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  WaitResult::of_fn(..) / of_blocking(..) / on(..) / WaitFile::new_file_in(..)
//!        │
//!        ▼
//!  ActionStage ─► PredicateStage ─► RetryStage ─► IntervalStage ─► ReadyStage
//!                                                                     │
//!                            ┌────────────── build() ─────────────────┤
//!                            ▼                                        ▼ using(executor)
//! ┌─────────────────────────────────────┐          ┌────────────────────────────────┐
//! │ PollingEngine                       │◄─────────│ AsyncHandle                    │
//! │  - AcceptingProbe (probe+predicate) │          │  - Executor (tokio runtime)    │
//! │  - RetryPolicy (count + waits)      │          │  - deadline, continuations     │
//! │  - ExceptionPolicy                  │          │  start() ─► Pending            │
//! │  - cleanup hook                     │          │   cancel / wait / .await       │
//! └───────────────┬─────────────────────┘          └────────────────────────────────┘
//!                 │ publishes
//!                 ▼
//!        Bus (broadcast) ──► SubscriberSet ──► LogWriter / custom subscribers
//! ```
//!
//! ### Lifecycle
//! ```text
//! resolve
//!   loop ProbeExecution::next()
//!   ├─► attempts ≥ count?  ─► exhaustion decision
//!   ├─► wait before attempt (retry number indexed, cancellable)
//!   ├─► publish AttemptStarting
//!   ├─► probe.attempt(ctx)
//!   │       ├─ Ok(v), predicate(v)  ─► AttemptAccepted  ─► Ok(Some(v))
//!   │       ├─ Ok(v), !predicate(v) ─► AttemptRejected  ─► continue
//!   │       └─ Err(e)               ─► AttemptFailed
//!   │                                  ├─ fail-fast ─► QualificationFailed ─► Err
//!   │                                  └─ ignored   ─► continue
//!   └─ exhaustion:
//!        ├─ last attempt failed and final failures are not ignored ─► Err
//!        └─ otherwise ─► Exhausted ─► Ok(None)
//!
//! On every exit (cancellation and deadline included): cleanup hook, CleanupRan.
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                           |
//! |-------------------|-----------------------------------------------------------------|----------------------------------------------|
//! | **Builder**       | Compile-time ordered configuration steps.                       | [`WaitResult`], [`ReadyStage`]               |
//! | **Probes**        | Async or blocking closures, custom probe types, predicates.     | [`Probe`], [`ProbeFn`], [`Expectation`]      |
//! | **Policies**      | Retry budget, wait strategies, exception handling.              | [`RetryPolicy`], [`ExceptionPolicy`]         |
//! | **Execution**     | Blocking or async resolution, handles with cancel and deadline. | [`PollingEngine`], [`AsyncHandle`], [`Pending`] |
//! | **Subscriber API**| Observe attempts and outcomes.                                  | [`Subscribe`], [`SubscriberSet`], [`Bus`]    |
//! | **Errors**        | One failure type for every resolution surface.                  | [`PollError`], [`QualificationError`]        |
//! | **Configuration** | Deadline, executor and bus settings.                            | [`Config`], [`Executor`]                     |
//!
//! ## Optional features
//! - `watch` (default): directory-watch probe and [`WaitFile`] factories.
//! - `logging`: exports the built-in `tracing` subscriber `LogWriter`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use pollvisor::{BoxError, WaitResult};
//!
//! let calls = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&calls);
//!
//! let status = WaitResult::of_blocking("service-status", move || {
//!         let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!         if n < 3 {
//!             Err::<&str, BoxError>("connection refused".into())
//!         } else {
//!             Ok("UP")
//!         }
//!     })
//!     .ignore_exception(false)
//!     .expecting_equals_to("UP")
//!     .repeat_count(5)
//!     .every_ms(10)
//!     .resolve()
//!     .unwrap();
//!
//! assert_eq!(status, Some("UP"));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! ```
mod builder;
mod core;
mod error;
mod events;
mod policies;
mod probes;
mod subscribers;

// ---- Public re-exports ----

pub use builder::{ActionStage, IntervalStage, PredicateStage, ReadyStage, RetryStage, WaitResult};
pub use crate::core::{
    AsyncHandle, AttemptOutcome, CleanupFn, Config, ExecutionState, Executor, OwnedRuntime, Pending,
    PollingEngine, ProbeExecution,
};
pub use error::{BoxError, PollError, ProbeFailure, QualificationError, Stage};
pub use events::{Bus, Event, EventKind};
pub use policies::{
    BackoffPolicy, ExceptionDecision, ExceptionPolicy, JitterPolicy, RetryPolicy, WaitFn,
    WaitStrategy,
};
pub use probes::{
    AcceptingProbe, BlockingProbe, BoxProbeFuture, Expectation, Probe, ProbeFn, ProbeRef,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: directory watching over `notify`.
// Enabled by default, disable with `--no-default-features`.
#[cfg(feature = "watch")]
mod watch;
#[cfg(feature = "watch")]
pub use watch::{DirectoryWatch, WaitFile, WatchEvent, WatchKind};

// Optional: built-in `tracing` subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
