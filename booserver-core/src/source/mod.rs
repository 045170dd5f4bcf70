//! Per-root orchestration.
//!
//! Each configured source root gets one media source running as an actor:
//! commands and watcher events are multiplexed through a single loop so the
//! in-memory file cache, change emissions and watcher suspensions never
//! interleave. The cloneable [`MediaSourceHandle`] is the only way in.

mod actor;
mod commands;
mod core;
mod handle;

// Re-export public API
pub use actor::spawn_media_source;
pub use commands::MediaSourceCommand;
pub use handle::MediaSourceHandle;

use crate::convert::ConvertError;
use crate::media::{MediaError, MediaFile};
use crate::watcher::WatcherError;

/// Kind of change a source reports about one of its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaChangeKind {
    /// The file is newly indexed.
    Created,
    /// The file's observed state changed.
    Changed,
    /// The file left the index.
    Deleted,
    /// The file moved to a new path.
    Renamed,
}

/// One change to a source's file set, as delivered to the manager.
#[derive(Debug, Clone)]
pub struct MediaChange {
    /// What happened.
    pub kind: MediaChangeKind,
    /// The file after the change (before it, for deletions).
    pub file: MediaFile,
    /// Previous path, set for renames only.
    pub old_path: Option<String>,
}

/// Errors from per-source orchestration.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The watcher backend failed.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Conversion or probing failed.
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// A media file could not be described.
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// The source actor is no longer running.
    #[error("media source actor is no longer running")]
    ActorShutdown,
}
