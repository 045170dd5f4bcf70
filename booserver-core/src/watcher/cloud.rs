//! Polling snapshot-diff backend for cloud-mounted roots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::file_list::ComparableFileList;
use super::FileChangeEvent;

/// Watcher that rescans its root at a fixed interval and emits the snapshot
/// difference: `Deleted` for vanished paths, `Created` for new ones.
///
/// Cloud mounts can list a file before its bytes are downloaded, so a
/// consumer that fails to read a just-announced path calls
/// `feedback_creation_error` to have it reported again on the next scan.
pub struct CloudWatcher {
    root: PathBuf,
    recursive: bool,
    interval: Duration,
    events: mpsc::UnboundedSender<FileChangeEvent>,
    retries: Arc<Mutex<HashSet<PathBuf>>>,
    worker: Option<Worker>,
}

struct Worker {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CloudWatcher {
    /// Creates a watcher over `root`; nothing is scanned until `start`.
    pub fn new(
        root: &Path,
        recursive: bool,
        interval: Duration,
        events: mpsc::UnboundedSender<FileChangeEvent>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            recursive,
            interval,
            events,
            retries: Arc::new(Mutex::new(HashSet::new())),
            worker: None,
        }
    }

    /// Arms the scan timer. A no-op when already running. The first scan
    /// only records a baseline snapshot and emits nothing.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_scan_loop(
            self.root.clone(),
            self.recursive,
            self.interval,
            self.events.clone(),
            self.retries.clone(),
            stop_rx,
        ));

        self.worker = Some(Worker { stop_tx, task });
        tracing::info!(
            "polling {} every {}ms",
            self.root.display(),
            self.interval.as_millis()
        );
    }

    /// Cancels the pending timer. A scan already in progress runs to
    /// completion first; resolution guarantees no further events. Returns
    /// true iff a timer was armed.
    pub async fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        let _ = worker.stop_tx.send(());
        let _ = worker.task.await;
        tracing::debug!("stopped polling {}", self.root.display());
        true
    }

    /// Marks `path` for re-observation: the next scan removes it from the
    /// committed snapshot, so it is reported `Created` again if still
    /// present.
    pub fn feedback_creation_error(&self, path: &Path) {
        self.retries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.to_path_buf());
    }
}

async fn run_scan_loop(
    root: PathBuf,
    recursive: bool,
    period: Duration,
    events: mpsc::UnboundedSender<FileChangeEvent>,
    retries: Arc<Mutex<HashSet<PathBuf>>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    // A tick that fires while a scan is still running is dropped, not queued.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut previous: Option<ComparableFileList> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => return,
            _ = interval.tick() => {
                scan_once(&root, recursive, &events, &retries, &mut previous).await;
            }
        }
    }
}

async fn scan_once(
    root: &Path,
    recursive: bool,
    events: &mpsc::UnboundedSender<FileChangeEvent>,
    retries: &Mutex<HashSet<PathBuf>>,
    previous: &mut Option<ComparableFileList>,
) {
    let current = match ComparableFileList::create(root, recursive).await {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!("scan of {} failed: {err}", root.display());
            return;
        }
    };

    if let Some(mut snapshot) = previous.take() {
        let retry_paths: Vec<PathBuf> = {
            let mut pending = retries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.drain().collect()
        };
        // Dropping a retried path from the committed snapshot makes it look
        // new again in the current one.
        for path in &retry_paths {
            snapshot.remove(path);
        }

        let diff = snapshot.compare(&current);
        for gone in &diff.only_in_src {
            let _ = events.send(FileChangeEvent::deleted(gone));
        }
        for fresh in &diff.only_in_dst {
            let _ = events.send(FileChangeEvent::created(fresh));
        }
    }

    *previous = Some(current);
}
