//! Resolution core: retry loop, engine and asynchronous execution.
//!
//! Internal modules:
//! - [`execution`]: one attempt per `next()` call, waits and cancellation;
//! - [`engine`]: full resolution with exception handling and cleanup;
//! - [`executor`]: which tokio runtime asynchronous resolutions run on;
//! - [`handle`]: reusable asynchronous handles and their pending resolutions;
//! - [`config`]: deadline, executor and bus settings.

mod config;
mod engine;
mod execution;
mod executor;
mod handle;

pub use config::Config;
pub use engine::{CleanupFn, PollingEngine};
pub use execution::{AttemptOutcome, ExecutionState, ProbeExecution};
pub use executor::{Executor, OwnedRuntime};
pub use handle::{AsyncHandle, Pending};
