//! # Filesystem watching.
//!
//! - [`DirectoryWatch`]: probe yielding the events observed since its previous poll
//! - [`WaitFile`]: builder factories over a directory watch

mod directory;
mod wait_file;

pub use directory::{DirectoryWatch, WatchEvent, WatchKind};
pub use wait_file::WaitFile;
