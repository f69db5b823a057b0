//! # Executors for asynchronous resolutions.
//!
//! An [`Executor`] names the tokio runtime an [`AsyncHandle`](crate::AsyncHandle)
//! spawns its worker on:
//!
//! - [`Executor::Shared`]: a lazily built multi-thread runtime shared by the
//!   whole process (default);
//! - [`Executor::Current`]: the ambient runtime of the caller, falling back to
//!   the shared one outside of any runtime;
//! - [`Executor::Handle`]: an explicit runtime handle;
//! - [`Executor::Dedicated`]: a runtime owned by the executor, built from a [`Config`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::core::config::Config;
use crate::error::PollError;

static SHARED: OnceLock<Runtime> = OnceLock::new();

/// Where asynchronous resolutions run.
#[derive(Clone, Default)]
pub enum Executor {
    /// Process-wide runtime, built on first use.
    #[default]
    Shared,
    /// Runtime of the caller of `start()`, or the shared one.
    Current,
    /// Explicit runtime handle.
    Handle(Handle),
    /// Runtime owned by this executor (and its clones).
    Dedicated(Arc<OwnedRuntime>),
}

impl Executor {
    /// The process-wide runtime.
    pub fn shared() -> Self {
        Executor::Shared
    }

    /// The caller's runtime.
    pub fn current() -> Self {
        Executor::Current
    }

    /// An explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Executor::Handle(handle)
    }

    /// Builds a runtime owned by the returned executor.
    pub fn dedicated(cfg: &Config) -> Result<Self, PollError> {
        let rt = build_runtime(cfg)?;
        Ok(Executor::Dedicated(Arc::new(OwnedRuntime(Some(rt)))))
    }

    /// Handle to spawn workers on.
    pub(crate) fn handle(&self) -> Result<Handle, PollError> {
        match self {
            Executor::Shared => shared().map(|rt| rt.handle().clone()),
            Executor::Current => match Handle::try_current() {
                Ok(handle) => Ok(handle),
                Err(_) => shared().map(|rt| rt.handle().clone()),
            },
            Executor::Handle(handle) => Ok(handle.clone()),
            Executor::Dedicated(owned) => owned.handle(),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Shared => f.write_str("Shared"),
            Executor::Current => f.write_str("Current"),
            Executor::Handle(_) => f.write_str("Handle(..)"),
            Executor::Dedicated(_) => f.write_str("Dedicated(..)"),
        }
    }
}

/// Runtime that shuts down in the background when dropped.
///
/// Dropping a plain [`Runtime`] blocks, which panics inside async contexts.
#[derive(Debug)]
pub struct OwnedRuntime(Option<Runtime>);

impl OwnedRuntime {
    fn handle(&self) -> Result<Handle, PollError> {
        self.0
            .as_ref()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| PollError::Worker {
                error: "executor runtime is shut down".to_string(),
            })
    }
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(rt) = self.0.take() {
            rt.shutdown_background();
        }
    }
}

fn shared() -> Result<&'static Runtime, PollError> {
    if let Some(rt) = SHARED.get() {
        return Ok(rt);
    }
    let rt = build_runtime(&Config::default())?;
    if let Err(lost) = SHARED.set(rt) {
        lost.shutdown_background();
    }
    SHARED.get().ok_or_else(|| PollError::Worker {
        error: "shared runtime unavailable".to_string(),
    })
}

fn build_runtime(cfg: &Config) -> Result<Runtime, PollError> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name(cfg.thread_name.clone());
    if let Some(n) = cfg.worker_threads() {
        builder.worker_threads(n);
    }
    builder.build().map_err(|e| PollError::Worker {
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::RuntimeFlavor;

    #[test]
    fn shared_runtime_is_built_once() {
        let a = shared().unwrap();
        let b = shared().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn current_falls_back_to_shared_outside_runtime() {
        let current = Executor::current().handle().unwrap();
        assert_eq!(current.runtime_flavor(), RuntimeFlavor::MultiThread);
    }

    #[tokio::test]
    async fn current_uses_the_ambient_runtime() {
        let current = Executor::current().handle().unwrap();
        assert_eq!(current.runtime_flavor(), RuntimeFlavor::CurrentThread);
    }

    #[test]
    fn dedicated_runtime_runs_tasks() {
        let cfg = Config {
            worker_threads: 1,
            ..Config::default()
        };
        let exec = Executor::dedicated(&cfg).unwrap();
        let handle = exec.handle().unwrap();
        let join = handle.spawn(async { 40 + 2 });
        assert_eq!(futures::executor::block_on(join).unwrap(), 42);
    }
}
