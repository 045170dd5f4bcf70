//! Filesystem change watching.
//!
//! Two backends emit one uniform event stream: [`LocalWatcher`] translates
//! native OS notifications, [`CloudWatcher`] diffs periodic directory
//! snapshots for roots on cloud mounts where native events never fire. A
//! [`FileWatcher`] wraps either behind the shared capability set
//! (start / stop / feedback), chosen by the source's `cloud` flag.

mod cloud;
mod file_list;
mod local;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

pub use cloud::CloudWatcher;
pub use file_list::{ComparableFileList, FileListDiff};
pub use local::LocalWatcher;

use crate::media::paths;

/// One observed filesystem change.
///
/// Serializes to the historical wire form consumed by BooServer tooling:
/// one JSON object per event with `changeType`, `name`, `fullPath` and, for
/// renames, `oldName`/`oldFullPath`. All paths are forward-slash-normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "changeType")]
pub enum FileChangeEvent {
    /// A file appeared.
    Created {
        /// File name.
        name: String,
        /// Normalized absolute path.
        #[serde(rename = "fullPath")]
        full_path: String,
    },
    /// A file's contents or attributes changed.
    Changed {
        /// File name.
        name: String,
        /// Normalized absolute path.
        #[serde(rename = "fullPath")]
        full_path: String,
    },
    /// A file vanished.
    Deleted {
        /// File name.
        name: String,
        /// Normalized absolute path.
        #[serde(rename = "fullPath")]
        full_path: String,
    },
    /// A file moved within the watched subtree.
    Renamed {
        /// New file name.
        name: String,
        /// New normalized absolute path.
        #[serde(rename = "fullPath")]
        full_path: String,
        /// Previous file name.
        #[serde(rename = "oldName")]
        old_name: String,
        /// Previous normalized absolute path.
        #[serde(rename = "oldFullPath")]
        old_full_path: String,
    },
}

impl FileChangeEvent {
    pub(crate) fn created(path: &Path) -> Self {
        FileChangeEvent::Created {
            name: paths::file_name_of(path),
            full_path: paths::normalize(path),
        }
    }

    pub(crate) fn changed(path: &Path) -> Self {
        FileChangeEvent::Changed {
            name: paths::file_name_of(path),
            full_path: paths::normalize(path),
        }
    }

    pub(crate) fn deleted(path: &Path) -> Self {
        FileChangeEvent::Deleted {
            name: paths::file_name_of(path),
            full_path: paths::normalize(path),
        }
    }

    pub(crate) fn renamed(old: &Path, new: &Path) -> Self {
        FileChangeEvent::Renamed {
            name: paths::file_name_of(new),
            full_path: paths::normalize(new),
            old_name: paths::file_name_of(old),
            old_full_path: paths::normalize(old),
        }
    }

    /// Normalized absolute path the event is about (the new path for
    /// renames).
    pub fn full_path(&self) -> &str {
        match self {
            FileChangeEvent::Created { full_path, .. }
            | FileChangeEvent::Changed { full_path, .. }
            | FileChangeEvent::Deleted { full_path, .. }
            | FileChangeEvent::Renamed { full_path, .. } => full_path,
        }
    }
}

/// Errors from watcher backends.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// The native observer could not be installed over the root.
    #[error("cannot observe {path}: {source}")]
    Observer {
        /// Root that was being watched.
        path: String,
        /// Underlying notify error.
        #[source]
        source: notify::Error,
    },
}

/// A change detector bound to one root: either native OS notifications or
/// periodic rescan-by-diff for cloud mounts.
pub enum FileWatcher {
    /// Native OS notification backend.
    Local(LocalWatcher),
    /// Polling snapshot-diff backend.
    Cloud(CloudWatcher),
}

impl FileWatcher {
    /// Creates the watcher appropriate for a root: polling when `cloud`,
    /// native events otherwise. Events go to `events`.
    pub fn for_root(
        root: &Path,
        recursive: bool,
        cloud: bool,
        scan_interval: Duration,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Self {
        if cloud {
            FileWatcher::Cloud(CloudWatcher::new(root, recursive, scan_interval, events))
        } else {
            FileWatcher::Local(LocalWatcher::new(root, recursive, events))
        }
    }

    /// Starts observing. A no-op when already running.
    ///
    /// # Errors
    ///
    /// - [`WatcherError::Observer`] - The native observer could not be
    ///   installed (local backend only)
    pub fn start(&mut self) -> Result<(), WatcherError> {
        match self {
            FileWatcher::Local(watcher) => watcher.start(),
            FileWatcher::Cloud(watcher) => {
                watcher.start();
                Ok(())
            }
        }
    }

    /// Stops observing; resolves only once no further events can be emitted.
    /// Returns whether the watcher was running.
    pub async fn stop(&mut self) -> bool {
        match self {
            FileWatcher::Local(watcher) => watcher.stop().await,
            FileWatcher::Cloud(watcher) => watcher.stop().await,
        }
    }

    /// Asks the watcher to re-observe `path` on its next cycle, after a
    /// consumer failed to read it. A no-op for the local backend, where the
    /// OS re-notifies on the next mutation.
    pub fn feedback_creation_error(&self, path: &Path) {
        match self {
            FileWatcher::Local(watcher) => watcher.feedback_creation_error(path),
            FileWatcher::Cloud(watcher) => watcher.feedback_creation_error(path),
        }
    }
}
