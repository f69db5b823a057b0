//! # Directory watch probe.
//!
//! [`DirectoryWatch`] polls a `notify` watcher over one directory
//! (non-recursive). Each call to [`DirectoryWatch::poll`] returns the events
//! observed since the previous call:
//!
//! ```text
//! poll() ──► open? ──no──► RecommendedWatcher::new + watch(dir)
//!              │
//!              └──► drain channel ──► keep Create / Modify / Remove of the wanted kinds
//! ```
//!
//! Access, rescan and other notifications are ignored. [`DirectoryWatch::close`]
//! drops the watcher; a later poll opens a new one, so events that happen
//! while the watch is closed are never reported.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::probes::{BoxProbeFuture, Probe};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// An entry appeared in the directory.
    Create,
    /// An entry changed (content, metadata or name).
    Modify,
    /// An entry disappeared from the directory.
    Remove,
}

impl WatchKind {
    fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Create(_) => Some(WatchKind::Create),
            notify::EventKind::Modify(_) => Some(WatchKind::Modify),
            notify::EventKind::Remove(_) => Some(WatchKind::Remove),
            _ => None,
        }
    }
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchKind,
    /// Path of the entry, as reported by the watcher.
    pub path: PathBuf,
}

impl WatchEvent {
    /// File name of the entry.
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

struct OpenWatch {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    // Watcher error met after some events were already drained.
    deferred: Option<notify::Error>,
}

/// Lazily opened watch over one directory.
pub struct DirectoryWatch {
    name: String,
    directory: PathBuf,
    kinds: Vec<WatchKind>,
    state: Mutex<Option<OpenWatch>>,
}

impl DirectoryWatch {
    /// Watch of `directory` reporting the given kinds; nothing is opened yet.
    pub fn new(directory: impl Into<PathBuf>, kinds: &[WatchKind]) -> Self {
        let directory = directory.into();
        Self {
            name: format!("watch {}", directory.display()),
            directory,
            kinds: kinds.to_vec(),
            state: Mutex::new(None),
        }
    }

    /// The watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The reported kinds.
    pub fn kinds(&self) -> &[WatchKind] {
        &self.kinds
    }

    /// True while a watcher is registered.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Registers the watcher now instead of on the first poll.
    pub fn open(&self) -> Result<(), notify::Error> {
        let mut state = self.lock();
        if state.is_none() {
            *state = Some(self.register()?);
        }
        Ok(())
    }

    /// Events observed since the previous poll (opening the watch if needed).
    ///
    /// A watcher error fails the poll. When events were already collected in
    /// the same drain, they are returned first and the error fails the next
    /// poll.
    pub fn poll(&self) -> Result<Vec<WatchEvent>, BoxError> {
        let mut state = self.lock();
        if state.is_none() {
            *state = Some(self.register()?);
        }
        let Some(open) = state.as_mut() else {
            return Ok(Vec::new());
        };

        if let Some(e) = open.deferred.take() {
            return Err(e.into());
        }

        let mut events = Vec::new();
        while let Ok(res) = open.rx.try_recv() {
            let event = match res {
                Ok(event) => event,
                Err(e) if events.is_empty() => return Err(e.into()),
                Err(e) => {
                    open.deferred = Some(e);
                    break;
                }
            };
            let Some(kind) = WatchKind::from_notify(&event.kind) else {
                continue;
            };
            if !self.kinds.contains(&kind) {
                continue;
            }
            events.extend(event.paths.into_iter().map(|path| WatchEvent { kind, path }));
        }
        Ok(events)
    }

    /// Releases the watcher. Idempotent.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            #[cfg(feature = "logging")]
            tracing::debug!(directory = %self.directory.display(), "directory watch closed");
        }
    }

    fn register(&self) -> Result<OpenWatch, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;

        #[cfg(feature = "logging")]
        tracing::debug!(directory = %self.directory.display(), "directory watch opened");

        Ok(OpenWatch {
            _watcher: watcher,
            rx,
            deferred: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<OpenWatch>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Probe<Vec<WatchEvent>> for DirectoryWatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self, _ctx: CancellationToken) -> BoxProbeFuture<Vec<WatchEvent>> {
        let res = self.poll();
        Box::pin(async move { res })
    }
}

impl fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("directory", &self.directory)
            .field("kinds", &self.kinds)
            .field("open", &self.is_open())
            .finish()
    }
}
