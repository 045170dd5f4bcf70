//! Handle for communicating with a media source actor.

use tokio::sync::{mpsc, oneshot};

use super::commands::MediaSourceCommand;
use super::SourceError;
use crate::media::MediaFile;

/// Cloneable async interface to one media source actor.
#[derive(Clone)]
pub struct MediaSourceHandle {
    sender: mpsc::Sender<MediaSourceCommand>,
}

impl MediaSourceHandle {
    pub(crate) fn new(sender: mpsc::Sender<MediaSourceCommand>) -> Self {
        Self { sender }
    }

    /// Runs the initial scan (including raw-data reconciliation) and
    /// returns the indexed files.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Io`] - The source root could not be read
    /// - [`SourceError::ActorShutdown`] - The actor is gone
    pub async fn scan(&self) -> Result<Vec<MediaFile>, SourceError> {
        let (responder, response) = oneshot::channel();
        self.send(MediaSourceCommand::Scan { responder }).await?;
        response.await.map_err(|_| SourceError::ActorShutdown)?
    }

    /// Starts the source's watchers.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Watcher`] - A watcher backend could not start
    /// - [`SourceError::ActorShutdown`] - The actor is gone
    pub async fn start_watching(&self) -> Result<(), SourceError> {
        let (responder, response) = oneshot::channel();
        self.send(MediaSourceCommand::StartWatching { responder }).await?;
        response.await.map_err(|_| SourceError::ActorShutdown)?
    }

    /// Stops the source's watchers; resolves once no further events can be
    /// emitted.
    ///
    /// # Errors
    ///
    /// - [`SourceError::ActorShutdown`] - The actor is gone
    pub async fn stop_watching(&self) -> Result<(), SourceError> {
        let (responder, response) = oneshot::channel();
        self.send(MediaSourceCommand::StopWatching { responder }).await?;
        response.await.map_err(|_| SourceError::ActorShutdown)
    }

    /// Snapshot of the source's current file set.
    ///
    /// # Errors
    ///
    /// - [`SourceError::ActorShutdown`] - The actor is gone
    pub async fn files(&self) -> Result<Vec<MediaFile>, SourceError> {
        let (responder, response) = oneshot::channel();
        self.send(MediaSourceCommand::Files { responder }).await?;
        response.await.map_err(|_| SourceError::ActorShutdown)
    }

    /// Stops watching and terminates the actor.
    ///
    /// # Errors
    ///
    /// - [`SourceError::ActorShutdown`] - The actor was already gone
    pub async fn shutdown(&self) -> Result<(), SourceError> {
        let (responder, response) = oneshot::channel();
        self.send(MediaSourceCommand::Shutdown { responder }).await?;
        response.await.map_err(|_| SourceError::ActorShutdown)
    }

    async fn send(&self, command: MediaSourceCommand) -> Result<(), SourceError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SourceError::ActorShutdown)
    }
}
