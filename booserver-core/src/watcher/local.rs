//! Native filesystem event backend.

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{FileChangeEvent, WatcherError};
use crate::media::paths;

type RawEvents = mpsc::UnboundedReceiver<Result<notify::Event, notify::Error>>;

/// Watcher backed by OS-level directory change notifications.
///
/// The underlying observer is recreated automatically if it fails while a
/// stop was not requested. `stop` resolves only after the observer has
/// actually been torn down.
pub struct LocalWatcher {
    root: PathBuf,
    recursive: bool,
    events: mpsc::UnboundedSender<FileChangeEvent>,
    worker: Option<Worker>,
}

struct Worker {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LocalWatcher {
    /// Creates a watcher over `root`; nothing is observed until `start`.
    pub fn new(
        root: &Path,
        recursive: bool,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            recursive,
            events,
            worker: None,
        }
    }

    /// Installs the observer and begins forwarding events. A no-op when
    /// already running.
    ///
    /// # Errors
    ///
    /// - [`WatcherError::Observer`] - The observer could not be installed
    ///   over the root
    pub fn start(&mut self) -> Result<(), WatcherError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (observer, raw_rx) = spawn_observer(&self.root, self.recursive)?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_observer_loop(
            self.root.clone(),
            self.recursive,
            self.events.clone(),
            observer,
            raw_rx,
            stop_rx,
        ));

        self.worker = Some(Worker { stop_tx, task });
        tracing::info!("watching {}", self.root.display());
        Ok(())
    }

    /// Stops observing. Resolves once the observer has terminated; no
    /// events are emitted after that. Returns whether the watcher was
    /// running.
    pub async fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        let _ = worker.stop_tx.send(());
        let _ = worker.task.await;
        tracing::debug!("stopped watching {}", self.root.display());
        true
    }

    /// No-op: the OS re-notifies on the next mutation of the path.
    pub fn feedback_creation_error(&self, _path: &Path) {}
}

fn spawn_observer(
    root: &Path,
    recursive: bool,
) -> Result<(RecommendedWatcher, RawEvents), WatcherError> {
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let observe = |source| WatcherError::Observer {
        path: paths::normalize(root),
        source,
    };

    let mut observer = notify::recommended_watcher(move |result| {
        let _ = raw_tx.send(result);
    })
    .map_err(observe)?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    observer.watch(root, mode).map_err(observe)?;

    Ok((observer, raw_rx))
}

async fn run_observer_loop(
    root: PathBuf,
    recursive: bool,
    events: mpsc::UnboundedSender<FileChangeEvent>,
    observer: RecommendedWatcher,
    raw_rx: RawEvents,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut observer = observer;
    let mut raw_rx = raw_rx;
    let mut pending_rename: Option<PathBuf> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => {
                drop(observer);
                return;
            }
            raw = raw_rx.recv() => {
                let failed = match raw {
                    Some(Ok(event)) => {
                        forward(&events, event, &mut pending_rename);
                        continue;
                    }
                    Some(Err(err)) => {
                        tracing::error!("observer for {} failed: {err}", root.display());
                        true
                    }
                    None => {
                        tracing::warn!("observer for {} terminated", root.display());
                        true
                    }
                };

                // Unexpected termination with no stop requested: tear down
                // and install a fresh observer.
                if failed {
                    drop(observer);
                    match spawn_observer(&root, recursive) {
                        Ok((next_observer, next_rx)) => {
                            tracing::info!("restarted observer for {}", root.display());
                            observer = next_observer;
                            raw_rx = next_rx;
                        }
                        Err(err) => {
                            tracing::error!("cannot restart observer for {}: {err}", root.display());
                            // Wait out the stop signal; nothing left to forward.
                            let _ = (&mut stop_rx).await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Translates a raw notify event into the uniform change stream.
///
/// Rename notifications arrive either as one event carrying both paths or as
/// a From/To pair; the `pending_rename` slot holds an unpaired From until its
/// To shows up.
fn forward(
    events: &mpsc::UnboundedSender<FileChangeEvent>,
    event: notify::Event,
    pending_rename: &mut Option<PathBuf>,
) {
    match event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                let _ = events.send(FileChangeEvent::created(path));
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                let _ = events.send(FileChangeEvent::deleted(path));
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => forward_rename(events, &event, mode, pending_rename),
        EventKind::Modify(_) => {
            for path in &event.paths {
                let _ = events.send(FileChangeEvent::changed(path));
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
}

fn forward_rename(
    events: &mpsc::UnboundedSender<FileChangeEvent>,
    event: &notify::Event,
    mode: RenameMode,
    pending_rename: &mut Option<PathBuf>,
) {
    match mode {
        RenameMode::Both => {
            if let [old, new] = event.paths.as_slice() {
                let _ = events.send(FileChangeEvent::renamed(old, new));
            }
        }
        RenameMode::From => {
            if let Some(path) = event.paths.first() {
                *pending_rename = Some(path.clone());
            }
        }
        RenameMode::To => {
            if let Some(new) = event.paths.first() {
                match pending_rename.take() {
                    Some(old) => {
                        let _ = events.send(FileChangeEvent::renamed(&old, new));
                    }
                    // A move into the watched subtree from outside it.
                    None => {
                        let _ = events.send(FileChangeEvent::created(new));
                    }
                }
            }
        }
        RenameMode::Any | RenameMode::Other => {
            if let Some(path) = event.paths.first() {
                if path.exists() {
                    let _ = events.send(FileChangeEvent::created(path));
                } else {
                    let _ = events.send(FileChangeEvent::deleted(path));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn next_event(
        rx: &mut mpsc::UnboundedReceiver<FileChangeEvent>,
    ) -> Option<FileChangeEvent> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_create_is_observed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = LocalWatcher::new(temp_dir.path(), true, tx);
        watcher.start().unwrap();

        // Give the observer a moment to arm before mutating.
        tokio::time::sleep(Duration::from_millis(250)).await;
        std::fs::write(temp_dir.path().join("a.mp4"), b"payload").unwrap();

        let mut saw_create = false;
        while let Some(event) = next_event(&mut rx).await {
            if event.full_path().ends_with("a.mp4") {
                saw_create = true;
                break;
            }
        }
        assert!(saw_create, "expected an event for the new file");

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_stop_reports_running_state_and_silences_events() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = LocalWatcher::new(temp_dir.path(), true, tx);

        assert!(!watcher.stop().await, "never started");

        watcher.start().unwrap();
        watcher.start().unwrap(); // no-op on a running watcher
        assert!(watcher.stop().await);

        // Mutations after stop resolution produce no events.
        std::fs::write(temp_dir.path().join("late.mp4"), b"late").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rename_pairing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = None;

        let from = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/m/a.mp4"));
        let to = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/m/b.mp4"));

        forward(&tx, from, &mut pending);
        assert!(rx.try_recv().is_err(), "unpaired From emits nothing yet");

        forward(&tx, to, &mut pending);
        assert_eq!(
            rx.try_recv().unwrap(),
            FileChangeEvent::renamed(Path::new("/m/a.mp4"), Path::new("/m/b.mp4"))
        );
    }
}
