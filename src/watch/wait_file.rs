//! # Filesystem waits.
//!
//! [`WaitFile`] factories build stages over a fresh [`DirectoryWatch`]. The
//! watch opens on the first attempt and is closed by the cleanup hook when
//! the resolution ends, whatever the outcome.
//!
//! ```no_run
//! use pollvisor::WaitFile;
//!
//! let created = WaitFile::new_file_named_in("/tmp/spool", "done.flag")
//!     .repeat_count(60)
//!     .every_second()
//!     .finish_with_a_result()
//!     .unwrap();
//! println!("{:?}", created[0].path);
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::builder::{ActionStage, RetryStage, WaitResult};
use crate::probes::{BoxProbeFuture, Expectation, Probe, ProbeRef};
use crate::watch::directory::{DirectoryWatch, WatchEvent, WatchKind};

/// Factories of filesystem waits.
#[derive(Debug, Clone, Copy)]
pub struct WaitFile;

impl WaitFile {
    /// Waits for events of the given kinds in `directory`.
    pub fn event_in(
        directory: impl Into<PathBuf>,
        kinds: &[WatchKind],
    ) -> ActionStage<Vec<WatchEvent>> {
        let watch = Arc::new(DirectoryWatch::new(directory, kinds));
        let closer = Arc::clone(&watch);
        let probe: ProbeRef<Vec<WatchEvent>> = watch;
        WaitResult::of(probe).with_cleanup(Arc::new(move || closer.close()))
    }

    /// Waits for any new entry in `directory`.
    pub fn new_file_in(directory: impl Into<PathBuf>) -> RetryStage<Vec<WatchEvent>> {
        Self::event_in(directory, &[WatchKind::Create])
            .expecting_that(non_empty("new entry"))
    }

    /// Waits for an entry named `name` to appear in `directory`.
    ///
    /// The accepted value only holds the events of that entry.
    pub fn new_file_named_in(
        directory: impl Into<PathBuf>,
        name: impl Into<OsString>,
    ) -> RetryStage<Vec<WatchEvent>> {
        let name = name.into();
        let watch = Arc::new(NamedWatch {
            inner: DirectoryWatch::new(directory, &[WatchKind::Create]),
            name,
        });
        let closer = Arc::clone(&watch);
        let probe: ProbeRef<Vec<WatchEvent>> = watch;
        WaitResult::of(probe)
            .with_cleanup(Arc::new(move || closer.inner.close()))
            .expecting_that(non_empty("named entry"))
    }

    /// Waits for any entry to disappear from `directory`.
    pub fn removed_file_from(directory: impl Into<PathBuf>) -> RetryStage<Vec<WatchEvent>> {
        Self::event_in(directory, &[WatchKind::Remove])
            .expecting_that(non_empty("removed entry"))
    }
}

fn non_empty(description: &'static str) -> Expectation<Vec<WatchEvent>> {
    Expectation::new(description, |events: &Vec<WatchEvent>| !events.is_empty())
}

/// Directory watch keeping only the events of one entry name.
struct NamedWatch {
    inner: DirectoryWatch,
    name: OsString,
}

impl Probe<Vec<WatchEvent>> for NamedWatch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn attempt(&self, _ctx: CancellationToken) -> BoxProbeFuture<Vec<WatchEvent>> {
        let res = self.inner.poll().map(|events| {
            events
                .into_iter()
                .filter(|ev| ev.file_name() == Some(self.name.as_os_str()))
                .collect::<Vec<_>>()
        });
        Box::pin(async move { res })
    }
}
