//! Aggregation across all media sources.
//!
//! [`MediaFileManager`] owns the shared metadata store and one actor per
//! configured source. Startup reconciliation aligns the store with what the
//! scans actually found; afterwards a single change loop mirrors every
//! source event into the store.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::convert::MediaConverter;
use crate::source::{spawn_media_source, MediaChange, MediaChangeKind, MediaSourceHandle};
use crate::store::{MetaData, MetaDataStore, StoreError};
use crate::BooError;

/// Aggregator over all configured media sources.
pub struct MediaFileManager {
    store: Arc<MetaDataStore>,
    sources: Vec<MediaSourceHandle>,
    last_updated: Arc<AtomicI64>,
}

impl MediaFileManager {
    /// Opens the store, scans every source, reconciles the store with the
    /// filesystem truth and starts watching.
    ///
    /// Reconciliation: records whose file was found are kept, files without
    /// a record are inserted, and records whose file has vanished are
    /// deleted.
    ///
    /// # Errors
    ///
    /// - [`BooError::Store`] - The store could not be opened or written
    /// - [`BooError::Source`] - A source root could not be scanned or a
    ///   watcher could not start
    pub async fn create(
        config: &ServerConfig,
        converter: Arc<dyn MediaConverter>,
    ) -> Result<Self, BooError> {
        let store = Arc::new(MetaDataStore::open(&config.store.path).await?);

        let mut orphaned: HashSet<String> = store
            .get_all()
            .await?
            .into_iter()
            .map(|record| record.path)
            .collect();

        let scan_interval = Duration::from_millis(config.cloud.scan_interval_ms);
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let sources: Vec<MediaSourceHandle> = config
            .sources
            .iter()
            .map(|source_config| {
                spawn_media_source(
                    source_config.clone(),
                    scan_interval,
                    converter.clone(),
                    change_tx.clone(),
                )
            })
            .collect();
        // The actors hold their own senders now; the change loop ends when
        // the last actor goes away.
        drop(change_tx);

        let last_updated = Arc::new(AtomicI64::new(0));
        tokio::spawn(run_change_loop(
            change_rx,
            store.clone(),
            last_updated.clone(),
        ));

        for source in &sources {
            for file in source.scan().await? {
                if orphaned.remove(&file.path) {
                    continue;
                }
                store.upsert(&file).await?;
            }
        }

        if !orphaned.is_empty() {
            tracing::info!("removing {} records for vanished files", orphaned.len());
            let vanished: Vec<String> = orphaned.into_iter().collect();
            store.delete_many(&vanished).await?;
        }

        last_updated.store(now_millis(), Ordering::SeqCst);

        for source in &sources {
            source.start_watching().await?;
        }

        Ok(Self {
            store,
            sources,
            last_updated,
        })
    }

    /// Every record in the store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn all_files(&self) -> Result<Vec<MetaData>, StoreError> {
        self.store.get_all().await
    }

    /// Record with the given id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] - The query failed
    pub async fn file_by_id(&self, id: i64) -> Result<Option<MetaData>, StoreError> {
        self.store.get_by_id(id).await
    }

    /// Milliseconds-since-epoch timestamp of the last store mutation (or of
    /// startup reconciliation, whichever is later).
    pub fn last_updated(&self) -> i64 {
        self.last_updated.load(Ordering::SeqCst)
    }

    /// The shared metadata store, for the front-end's filtered queries.
    pub fn store(&self) -> &MetaDataStore {
        &self.store
    }

    /// Stops every source's watchers; resolves once no further events can
    /// arrive.
    pub async fn stop_watching(&self) {
        for source in &self.sources {
            if let Err(err) = source.stop_watching().await {
                tracing::error!("cannot stop watching: {err}");
            }
        }
    }

    /// Terminates all source actors and closes the store.
    pub async fn shutdown(&self) {
        for source in &self.sources {
            let _ = source.shutdown().await;
        }
        self.store.close().await;
    }
}

/// Mirrors source changes into the store, bumping the freshness timestamp
/// after every mutation. Store failures are logged and the loop stays live.
async fn run_change_loop(
    mut changes: mpsc::UnboundedReceiver<MediaChange>,
    store: Arc<MetaDataStore>,
    last_updated: Arc<AtomicI64>,
) {
    while let Some(change) = changes.recv().await {
        let mutated = apply_change(&store, &change).await;
        match mutated {
            Ok(true) => {
                last_updated.store(now_millis(), Ordering::SeqCst);
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!("cannot persist change for {}: {err}", change.file.path);
            }
        }
    }
    tracing::debug!("change loop stopped");
}

async fn apply_change(store: &MetaDataStore, change: &MediaChange) -> Result<bool, StoreError> {
    match change.kind {
        MediaChangeKind::Created | MediaChangeKind::Changed => {
            store.upsert(&change.file).await?;
            Ok(true)
        }
        MediaChangeKind::Deleted => store.delete(&change.file.path).await,
        MediaChangeKind::Renamed => {
            if let Some(old_path) = &change.old_path {
                // Move the record first to keep its id and user-authored
                // fields; a record may be missing when the rename raced the
                // initial scan, in which case update_path is a no-op.
                store
                    .update_path(old_path, &change.file.path, Some(&change.file.title))
                    .await?;
            }
            // Refresh the derived fields (the category changes when a file
            // moves between directories), or insert the record the no-op
            // case left missing.
            store.upsert(&change.file).await?;
            Ok(true)
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
