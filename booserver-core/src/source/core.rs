//! Media source state and reconciliation logic.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{MediaChange, MediaChangeKind, SourceError};
use crate::config::SourceConfig;
use crate::convert::MediaConverter;
use crate::media::{self, MediaError, MediaFile, paths};
use crate::watcher::{ComparableFileList, FileChangeEvent, FileWatcher};

type EventReceiver = mpsc::UnboundedReceiver<FileChangeEvent>;
type ScanFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>>;

/// Orchestrator for one source root.
///
/// Holds the authoritative in-memory view of the root (`files`, keyed by
/// normalized absolute path), the watcher over the root and, when a raw-data
/// staging directory is configured, its watcher too. All methods run on the
/// owning actor, so handling is serialized by construction.
pub struct MediaSource {
    config: SourceConfig,
    converter: Arc<dyn MediaConverter>,
    files: HashMap<String, MediaFile>,
    watcher: FileWatcher,
    raw_watcher: Option<FileWatcher>,
    changes: mpsc::UnboundedSender<MediaChange>,
}

impl MediaSource {
    /// Builds the source and its watcher event channels. The receivers are
    /// consumed by the actor loop; nothing is watched until
    /// [`Self::start_watching`].
    pub(crate) fn new(
        config: SourceConfig,
        scan_interval: Duration,
        converter: Arc<dyn MediaConverter>,
        changes: mpsc::UnboundedSender<MediaChange>,
    ) -> (Self, EventReceiver, EventReceiver) {
        let (primary_tx, primary_rx) = mpsc::unbounded_channel();
        let watcher = FileWatcher::for_root(
            &config.path,
            config.recursive,
            config.cloud,
            scan_interval,
            primary_tx,
        );

        // The raw receiver exists even without raw-data config; its sender
        // is dropped immediately then, which closes the channel.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let raw_watcher = config.raw_data.as_ref().map(|raw| {
            FileWatcher::for_root(&raw.path, raw.recursive, raw.cloud, scan_interval, raw_tx)
        });

        let source = Self {
            config,
            converter,
            files: HashMap::new(),
            watcher,
            raw_watcher,
            changes,
        };
        (source, primary_rx, raw_rx)
    }

    /// Display name of the source.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Clone of the current file set, ordered by path.
    pub(crate) fn files_snapshot(&self) -> Vec<MediaFile> {
        let mut snapshot: Vec<MediaFile> = self.files.values().cloned().collect();
        snapshot.sort_by(|a, b| a.path.cmp(&b.path));
        snapshot
    }

    /// Walks the root, rebuilding the file set, then imports anything new in
    /// the raw-data staging directory. Returns the resulting file set.
    ///
    /// Files whose duration cannot be probed are logged and skipped; an
    /// unreadable root is fatal.
    pub(crate) async fn scan(&mut self) -> Result<Vec<MediaFile>, SourceError> {
        tracing::info!("scanning {} ({})", self.config.name, self.config.path.display());
        self.files.clear();
        let root = self.config.path.clone();
        let recursive = self.config.recursive;
        self.scan_dir(root, recursive).await?;
        self.reconcile_raw().await?;
        tracing::info!("{}: {} files indexed", self.config.name, self.files.len());
        Ok(self.files_snapshot())
    }

    fn scan_dir<'a>(&'a mut self, dir: PathBuf, recursive: bool) -> ScanFuture<'a> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(&dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    if recursive {
                        self.scan_dir(path, recursive).await?;
                    }
                    continue;
                }
                if !file_type.is_file() || !media::is_acceptable(&media::extension_of(&path)) {
                    continue;
                }

                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        tracing::warn!("cannot stat {}: {err}", path.display());
                        continue;
                    }
                };
                let described = MediaFile::probe_with(
                    &self.config.path,
                    &path,
                    metadata.len(),
                    media::mtime_millis(&metadata),
                    &*self.converter,
                )
                .await;
                match described {
                    Ok(file) => {
                        self.files.insert(file.path.clone(), file);
                    }
                    Err(err) => tracing::warn!("skipping {}: {err}", path.display()),
                }
            }

            Ok(())
        })
    }

    /// Imports every raw-data file that has no counterpart under the root
    /// yet. Individual import failures are logged; list building errors are
    /// fatal.
    async fn reconcile_raw(&mut self) -> Result<(), SourceError> {
        let Some(raw) = self.config.raw_data.clone() else {
            return Ok(());
        };

        let raw_list = ComparableFileList::create(&raw.path, raw.recursive).await?;
        let current = ComparableFileList::create(&self.config.path, self.config.recursive).await?;
        let pending = raw_list.compare(&current).only_in_src;
        if !pending.is_empty() {
            tracing::info!("{}: {} raw-data files to import", self.config.name, pending.len());
        }

        for raw_path in pending {
            if let Err(err) = self.process_raw_file(&raw_path).await {
                tracing::error!("import of {} failed: {err}", raw_path.display());
            }
        }
        Ok(())
    }

    /// Imports one file from the raw-data staging directory: convert (mp4)
    /// or copy it under the root, index it and emit a synthetic `Created`.
    ///
    /// Idempotent: an already-present target is left untouched. The primary
    /// watcher is suspended around the write so the source's own mutation
    /// cannot echo back as an external event; it resumes even when the
    /// import fails, and only if it was running before.
    pub(crate) async fn process_raw_file(&mut self, raw_path: &Path) -> Result<(), SourceError> {
        let Some(raw) = self.config.raw_data.clone() else {
            return Ok(());
        };
        let ext = media::extension_of(raw_path);
        if !media::is_acceptable(&ext) {
            tracing::debug!("raw-data file {} has no accepted extension", raw_path.display());
            return Ok(());
        }
        let Some(rel) = paths::relative(&raw.path, raw_path) else {
            tracing::debug!("{} is outside the raw-data root", raw_path.display());
            return Ok(());
        };
        let target = self.config.path.join(&rel);

        if tokio::fs::try_exists(&target).await? {
            tracing::info!("{} already imported, skipping", raw_path.display());
            return Ok(());
        }
        paths::ensure_parent_dir(&target).await?;

        // Probe before touching the target: on a cloud mount the listing can
        // precede the bytes, and the watcher will re-announce the path.
        if matches!(ext.as_str(), ".mp4" | ".mp3")
            && let Err(err) = self.converter.duration(raw_path).await
        {
            tracing::warn!("{} not readable yet: {err}", raw_path.display());
            if let Some(watcher) = &self.raw_watcher {
                watcher.feedback_creation_error(raw_path);
            }
            return Ok(());
        }

        let was_running = self.watcher.stop().await;
        let imported = self.import_raw_file(raw_path, &target, &ext).await;
        if was_running && let Err(err) = self.watcher.start() {
            tracing::error!("cannot resume watcher over {}: {err}", self.config.path.display());
        }
        imported
    }

    async fn import_raw_file(
        &mut self,
        raw_path: &Path,
        target: &Path,
        ext: &str,
    ) -> Result<(), SourceError> {
        let converted = if ext == ".mp4" {
            match self.converter.convert(raw_path, target).await {
                Ok(converted) => converted,
                Err(err) => {
                    // A failed conversion can leave a partial target behind;
                    // drop it so the next scan retries the import.
                    let _ = tokio::fs::remove_file(target).await;
                    return Err(err.into());
                }
            }
        } else {
            false
        };
        if !converted {
            tokio::fs::copy(raw_path, target).await?;
        }

        let file = MediaFile::probe(&self.config.path, target, &*self.converter).await?;
        tracing::info!("imported {} -> {}", raw_path.display(), file.path);
        self.files.insert(file.path.clone(), file.clone());
        self.emit(MediaChangeKind::Created, file, None);
        Ok(())
    }

    /// Starts the primary watcher and, when configured, the raw-data
    /// watcher.
    pub(crate) fn start_watching(&mut self) -> Result<(), SourceError> {
        self.watcher.start()?;
        if let Some(watcher) = &mut self.raw_watcher {
            watcher.start()?;
        }
        Ok(())
    }

    /// Stops both watchers; resolves once no further events can arrive.
    pub(crate) async fn stop_watching(&mut self) {
        self.watcher.stop().await;
        if let Some(watcher) = &mut self.raw_watcher {
            watcher.stop().await;
        }
    }

    /// Applies one primary watcher event to the file set.
    pub(crate) async fn handle_primary_event(&mut self, event: FileChangeEvent) {
        let Some(event) = filter_event(event) else {
            return;
        };
        match event {
            FileChangeEvent::Created { full_path, .. } | FileChangeEvent::Changed { full_path, .. } => {
                self.observe_upsert(full_path).await;
            }
            FileChangeEvent::Deleted { full_path, .. } => self.observe_deleted(&full_path),
            FileChangeEvent::Renamed {
                full_path,
                old_full_path,
                ..
            } => self.observe_renamed(old_full_path, full_path),
        }
    }

    async fn observe_upsert(&mut self, full_path: String) {
        let path = Path::new(&full_path);
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!("cannot stat {full_path}: {err}");
                return;
            }
        };
        let length = metadata.len();
        let date = media::mtime_millis(&metadata);

        let kind = match self.files.get(&full_path) {
            Some(cached) if cached.length == length && cached.date == date => {
                tracing::debug!("coalesced no-op change for {full_path}");
                return;
            }
            Some(_) => MediaChangeKind::Changed,
            None => MediaChangeKind::Created,
        };

        let described =
            MediaFile::probe_with(&self.config.path, path, length, date, &*self.converter).await;
        let file = match described {
            Ok(file) => file,
            Err(MediaError::Probe(err)) => {
                // Still being written (or still downloading on a cloud
                // mount); ask the watcher to re-announce it.
                tracing::warn!("{full_path} not probeable yet: {err}");
                self.watcher.feedback_creation_error(path);
                return;
            }
            Err(err) => {
                tracing::warn!("cannot describe {full_path}: {err}");
                return;
            }
        };

        self.files.insert(full_path, file.clone());
        self.emit(kind, file, None);
    }

    fn observe_deleted(&mut self, full_path: &str) {
        if let Some(file) = self.files.remove(full_path) {
            self.emit(MediaChangeKind::Deleted, file, None);
        }
    }

    fn observe_renamed(&mut self, old_full_path: String, full_path: String) {
        let Some(mut file) = self.files.remove(&old_full_path) else {
            tracing::debug!("rename of untracked {old_full_path} ignored");
            return;
        };

        let new_path = Path::new(&full_path);
        file.path = full_path.clone();
        file.title = paths::title_of(new_path);
        file.category = media::category_for(&self.config.path, new_path);
        self.files.insert(full_path, file.clone());
        self.emit(MediaChangeKind::Renamed, file, Some(old_full_path));
    }

    /// Applies one raw-data watcher event. Only `Created` is actionable;
    /// the staging directory is treated as append-only.
    pub(crate) async fn handle_raw_event(&mut self, event: FileChangeEvent) {
        match event {
            FileChangeEvent::Created { full_path, .. } => {
                if !media::is_acceptable(&media::extension_of(Path::new(&full_path))) {
                    return;
                }
                let raw_path = PathBuf::from(&full_path);
                if let Err(err) = self.process_raw_file(&raw_path).await {
                    tracing::error!("import of {full_path} failed: {err}");
                }
            }
            other => {
                tracing::debug!("ignoring raw-data event for {}", other.full_path());
            }
        }
    }

    fn emit(&self, kind: MediaChangeKind, file: MediaFile, old_path: Option<String>) {
        let _ = self.changes.send(MediaChange {
            kind,
            file,
            old_path,
        });
    }
}

/// Drops events for paths outside the accepted extension set, except that a
/// rename moving an accepted file to an unaccepted name becomes a deletion
/// of the old path.
fn filter_event(event: FileChangeEvent) -> Option<FileChangeEvent> {
    if media::is_acceptable(&media::extension_of(Path::new(event.full_path()))) {
        return Some(event);
    }
    if let FileChangeEvent::Renamed { old_full_path, .. } = event
        && media::is_acceptable(&media::extension_of(Path::new(&old_full_path)))
    {
        return Some(FileChangeEvent::deleted(Path::new(&old_full_path)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawDataConfig;
    use crate::convert::simulation::SimulationConverter;
    use crate::source::MediaChangeKind;

    struct Fixture {
        source: MediaSource,
        changes: mpsc::UnboundedReceiver<MediaChange>,
        converter: Arc<SimulationConverter>,
        _root: tempfile::TempDir,
        _raw: Option<tempfile::TempDir>,
    }

    fn fixture(raw_data: bool) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let raw = raw_data.then(|| tempfile::tempdir().unwrap());
        let config = SourceConfig {
            path: root.path().to_path_buf(),
            name: "test".to_string(),
            recursive: true,
            cloud: false,
            raw_data: raw.as_ref().map(|dir| RawDataConfig {
                path: dir.path().to_path_buf(),
                recursive: true,
                cloud: false,
            }),
        };
        let converter = Arc::new(SimulationConverter::new().with_duration(9.0));
        let (tx, rx) = mpsc::unbounded_channel();
        let (source, _primary_rx, _raw_rx) =
            MediaSource::new(config, Duration::from_secs(60), converter.clone(), tx);
        Fixture {
            source,
            changes: rx,
            converter,
            _root: root,
            _raw: raw,
        }
    }

    fn root_file(fixture: &Fixture, rel: &str) -> PathBuf {
        fixture.source.config.path.join(rel)
    }

    fn raw_file(fixture: &Fixture, rel: &str) -> PathBuf {
        fixture.source.config.raw_data.as_ref().unwrap().path.join(rel)
    }

    fn emitted(fixture: &mut Fixture) -> Vec<MediaChange> {
        let mut collected = Vec::new();
        while let Ok(change) = fixture.changes.try_recv() {
            collected.push(change);
        }
        collected
    }

    #[tokio::test]
    async fn test_scan_indexes_accepted_files_only() {
        let mut fixture = fixture(false);
        std::fs::write(root_file(&fixture, "a.mp4"), b"video").unwrap();
        std::fs::write(root_file(&fixture, "notes.txt"), b"nope").unwrap();
        std::fs::create_dir(root_file(&fixture, "sub")).unwrap();
        std::fs::write(root_file(&fixture, "sub/pic.png"), b"image").unwrap();

        let files = fixture.source.scan().await.unwrap();

        assert_eq!(files.len(), 2);
        let root = paths::normalize(&fixture.source.config.path);
        for file in &files {
            assert!(file.path.starts_with(&root), "path under the source root");
            assert!(!file.path.contains('\\'));
        }
        assert_eq!(files[0].category, "ROOT");
        assert_eq!(files[0].duration, 9.0);
        assert_eq!(files[1].category, "sub");
        assert_eq!(files[1].duration, 0.0);
    }

    #[tokio::test]
    async fn test_scan_skips_unprobeable_files() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();
        std::fs::write(root_file(&fixture, "pic.png"), b"image").unwrap();
        fixture.converter.fail_probe(&video);

        let files = fixture.source.scan().await.unwrap();

        assert_eq!(files.len(), 1, "the bad file is skipped, the scan continues");
        assert_eq!(files[0].ext, ".png");
    }

    #[tokio::test]
    async fn test_created_event_indexes_and_emits() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();

        fixture
            .source
            .handle_primary_event(FileChangeEvent::created(&video))
            .await;

        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Created);
        assert_eq!(changes[0].file.title, "a");
        assert!(fixture.source.files.contains_key(&changes[0].file.path));
    }

    #[tokio::test]
    async fn test_unaccepted_extension_is_dropped() {
        let mut fixture = fixture(false);
        let notes = root_file(&fixture, "notes.txt");
        std::fs::write(&notes, b"nope").unwrap();

        fixture
            .source
            .handle_primary_event(FileChangeEvent::created(&notes))
            .await;

        assert!(emitted(&mut fixture).is_empty());
        assert!(fixture.source.files.is_empty());
    }

    #[tokio::test]
    async fn test_matching_stat_coalesces_change_event() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();
        fixture.source.scan().await.unwrap();

        fixture
            .source
            .handle_primary_event(FileChangeEvent::changed(&video))
            .await;
        assert!(emitted(&mut fixture).is_empty(), "unchanged stat is noise");

        std::fs::write(&video, b"video with more bytes").unwrap();
        fixture
            .source
            .handle_primary_event(FileChangeEvent::changed(&video))
            .await;
        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Changed);
        assert_eq!(changes[0].file.length, 21);
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_event_with_feedback() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();
        fixture.converter.fail_probe(&video);

        fixture
            .source
            .handle_primary_event(FileChangeEvent::created(&video))
            .await;

        assert!(emitted(&mut fixture).is_empty());
        assert!(fixture.source.files.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_event_removes_tracked_file() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();
        fixture.source.scan().await.unwrap();

        fixture
            .source
            .handle_primary_event(FileChangeEvent::deleted(&video))
            .await;
        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Deleted);
        assert!(fixture.source.files.is_empty());

        // A second delete for the same path is not re-reported.
        fixture
            .source
            .handle_primary_event(FileChangeEvent::deleted(&video))
            .await;
        assert!(emitted(&mut fixture).is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_cache_entry() {
        let mut fixture = fixture(false);
        let old = root_file(&fixture, "a.mp4");
        std::fs::write(&old, b"video").unwrap();
        fixture.source.scan().await.unwrap();

        std::fs::create_dir(root_file(&fixture, "sub")).unwrap();
        let new = root_file(&fixture, "sub/b.mp4");
        std::fs::rename(&old, &new).unwrap();
        fixture
            .source
            .handle_primary_event(FileChangeEvent::renamed(&old, &new))
            .await;

        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Renamed);
        assert_eq!(changes[0].old_path.as_deref(), Some(paths::normalize(&old).as_str()));
        assert_eq!(changes[0].file.title, "b");
        assert_eq!(changes[0].file.category, "sub");
        assert_eq!(fixture.source.files.len(), 1);
        assert!(fixture.source.files.contains_key(&paths::normalize(&new)));
    }

    #[tokio::test]
    async fn test_rename_to_unaccepted_extension_is_promoted_to_delete() {
        let mut fixture = fixture(false);
        let video = root_file(&fixture, "a.mp4");
        std::fs::write(&video, b"video").unwrap();
        fixture.source.scan().await.unwrap();

        let renamed = root_file(&fixture, "a.bak");
        fixture
            .source
            .handle_primary_event(FileChangeEvent::renamed(&video, &renamed))
            .await;

        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Deleted);
        assert_eq!(changes[0].file.path, paths::normalize(&video));
        assert!(fixture.source.files.is_empty());
    }

    #[tokio::test]
    async fn test_rename_of_untracked_path_is_ignored() {
        let mut fixture = fixture(false);
        fixture
            .source
            .handle_primary_event(FileChangeEvent::renamed(
                &root_file(&fixture, "ghost.mp4"),
                &root_file(&fixture, "b.mp4"),
            ))
            .await;
        assert!(emitted(&mut fixture).is_empty());
    }

    #[tokio::test]
    async fn test_raw_import_copies_and_emits_created() {
        let mut fixture = fixture(true);
        std::fs::create_dir(raw_file(&fixture, "sub")).unwrap();
        let staged = raw_file(&fixture, "sub/pic.png");
        std::fs::write(&staged, b"image").unwrap();

        fixture.source.process_raw_file(&staged).await.unwrap();

        let target = root_file(&fixture, "sub/pic.png");
        assert!(target.is_file());
        let changes = emitted(&mut fixture);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, MediaChangeKind::Created);
        assert_eq!(changes[0].file.category, "sub");
        assert!(fixture.converter.conversions().is_empty(), "images are copied");
    }

    #[tokio::test]
    async fn test_raw_import_is_idempotent() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "pic.png");
        std::fs::write(&staged, b"image").unwrap();

        fixture.source.process_raw_file(&staged).await.unwrap();
        emitted(&mut fixture);
        let target = root_file(&fixture, "pic.png");
        let first_mtime = std::fs::metadata(&target).unwrap().modified().unwrap();

        fixture.source.process_raw_file(&staged).await.unwrap();

        assert!(emitted(&mut fixture).is_empty(), "no second Created");
        let second_mtime = std::fs::metadata(&target).unwrap().modified().unwrap();
        assert_eq!(first_mtime, second_mtime, "target untouched");
    }

    #[tokio::test]
    async fn test_raw_import_converts_mp4() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "v.mp4");
        std::fs::write(&staged, b"video").unwrap();

        fixture.source.process_raw_file(&staged).await.unwrap();

        let target = root_file(&fixture, "v.mp4");
        assert!(target.is_file());
        assert_eq!(fixture.converter.conversions(), vec![(staged, target)]);
        assert_eq!(emitted(&mut fixture).len(), 1);
    }

    #[tokio::test]
    async fn test_raw_import_defers_unprobeable_file() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "v.mp4");
        std::fs::write(&staged, b"partially materialized").unwrap();
        fixture.converter.fail_probe(&staged);

        fixture.source.process_raw_file(&staged).await.unwrap();

        assert!(!root_file(&fixture, "v.mp4").exists(), "nothing imported");
        assert!(emitted(&mut fixture).is_empty());
        assert!(fixture.converter.conversions().is_empty());

        // Once the bytes are readable the same call imports it.
        fixture.converter.unfail_probe(&staged);
        fixture.source.process_raw_file(&staged).await.unwrap();
        assert!(root_file(&fixture, "v.mp4").is_file());
        assert_eq!(emitted(&mut fixture).len(), 1);
    }

    #[tokio::test]
    async fn test_raw_import_conversion_failure_leaves_no_target() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "v.mp4");
        std::fs::write(&staged, b"video").unwrap();
        fixture.converter.fail_convert(&staged);

        let result = fixture.source.process_raw_file(&staged).await;

        assert!(matches!(result, Err(SourceError::Convert(_))));
        assert!(!root_file(&fixture, "v.mp4").exists());
        assert!(emitted(&mut fixture).is_empty());
    }

    #[tokio::test]
    async fn test_raw_import_copies_when_no_video_stream() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "v.mp4");
        std::fs::write(&staged, b"audio only").unwrap();
        fixture.converter.mark_no_video(&staged);

        fixture.source.process_raw_file(&staged).await.unwrap();

        let target = root_file(&fixture, "v.mp4");
        assert!(target.is_file());
        assert_eq!(std::fs::read(&target).unwrap(), b"audio only");
    }

    #[tokio::test]
    async fn test_raw_import_restores_watcher_state() {
        let mut fixture = fixture(true);
        let staged = raw_file(&fixture, "pic.png");
        std::fs::write(&staged, b"image").unwrap();

        // Not running before: the resume step must not start it.
        fixture.source.process_raw_file(&staged).await.unwrap();
        assert!(!fixture.source.watcher.stop().await);

        // Running before: suspended for the write, running again after.
        std::fs::write(raw_file(&fixture, "pic2.png"), b"image").unwrap();
        fixture.source.watcher.start().unwrap();
        fixture
            .source
            .process_raw_file(&raw_file(&fixture, "pic2.png"))
            .await
            .unwrap();
        assert!(fixture.source.watcher.stop().await, "watcher resumed");
    }
}
