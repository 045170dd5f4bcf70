//! Command definitions for the media source actor.

use tokio::sync::oneshot;

use super::SourceError;
use crate::media::MediaFile;

/// Commands that can be sent to a media source actor.
///
/// Each command carries a response channel. Because the actor also consumes
/// its watcher event streams, command handling never interleaves with event
/// handling.
pub enum MediaSourceCommand {
    /// Run the initial scan (including raw-data reconciliation) and return
    /// the resulting file set.
    Scan {
        /// Responds with the indexed files, ordered by path.
        responder: oneshot::Sender<Result<Vec<MediaFile>, SourceError>>,
    },
    /// Start the source's watchers.
    StartWatching {
        /// Responds once watching has begun.
        responder: oneshot::Sender<Result<(), SourceError>>,
    },
    /// Stop the source's watchers.
    StopWatching {
        /// Responds once no further events can be emitted.
        responder: oneshot::Sender<()>,
    },
    /// Snapshot of the current file set.
    Files {
        /// Responds with the files, ordered by path.
        responder: oneshot::Sender<Vec<MediaFile>>,
    },
    /// Stop watching and terminate the actor.
    Shutdown {
        /// Responds just before the actor exits.
        responder: oneshot::Sender<()>,
    },
}
