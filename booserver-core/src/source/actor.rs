//! Actor implementation for media sources.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::commands::MediaSourceCommand;
use super::core::MediaSource;
use super::handle::MediaSourceHandle;
use super::MediaChange;
use crate::config::SourceConfig;
use crate::convert::MediaConverter;
use crate::watcher::FileChangeEvent;

/// Spawns a media source actor and returns its handle.
///
/// The actor owns the source's file cache and both watchers; commands and
/// watcher events are processed one at a time in one loop, so cache
/// mutations, change emissions and watcher suspensions never race.
pub fn spawn_media_source(
    config: SourceConfig,
    scan_interval: Duration,
    converter: Arc<dyn MediaConverter>,
    changes: mpsc::UnboundedSender<MediaChange>,
) -> MediaSourceHandle {
    let (sender, receiver) = mpsc::channel(16);
    let (source, primary_rx, raw_rx) = MediaSource::new(config, scan_interval, converter, changes);

    tokio::spawn(async move {
        run_actor_loop(source, receiver, primary_rx, raw_rx).await;
    });

    MediaSourceHandle::new(sender)
}

async fn run_actor_loop(
    mut source: MediaSource,
    mut commands: mpsc::Receiver<MediaSourceCommand>,
    mut primary_events: mpsc::UnboundedReceiver<FileChangeEvent>,
    mut raw_events: mpsc::UnboundedReceiver<FileChangeEvent>,
) {
    tracing::debug!("media source actor started: {}", source.name());

    loop {
        tokio::select! {
            Some(command) = commands.recv() => {
                if !handle_command(&mut source, command).await {
                    break;
                }
            }
            Some(event) = primary_events.recv() => {
                source.handle_primary_event(event).await;
            }
            Some(event) = raw_events.recv() => {
                source.handle_raw_event(event).await;
            }
            else => break,
        }
    }

    tracing::debug!("media source actor stopped: {}", source.name());
}

/// Handles a single command. Returns false to terminate the actor.
async fn handle_command(source: &mut MediaSource, command: MediaSourceCommand) -> bool {
    match command {
        MediaSourceCommand::Scan { responder } => {
            let _ = responder.send(source.scan().await);
        }
        MediaSourceCommand::StartWatching { responder } => {
            let _ = responder.send(source.start_watching());
        }
        MediaSourceCommand::StopWatching { responder } => {
            source.stop_watching().await;
            let _ = responder.send(());
        }
        MediaSourceCommand::Files { responder } => {
            let _ = responder.send(source.files_snapshot());
        }
        MediaSourceCommand::Shutdown { responder } => {
            source.stop_watching().await;
            let _ = responder.send(());
            return false;
        }
    }
    true
}
