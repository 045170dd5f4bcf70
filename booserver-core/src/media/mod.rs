//! Media file model.
//!
//! [`MediaFile`] is the in-memory description of one indexed file: identity
//! (normalized path), presentation fields (title, category) and the last
//! observed filesystem state (size, mtime, probed duration). Instances are
//! built from stat data and, for video/audio, an ffprobe duration probe.

pub mod paths;

use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::convert::{ConvertError, MediaConverter};

/// Extensions the engine indexes, lowercase, with leading dot.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = [".mp4", ".mp3", ".jpeg", ".jpg", ".png"];

/// Category value for files that sit directly in their source root.
pub const ROOT_CATEGORY: &str = "ROOT";

/// Lowercase extension of a path including the leading dot; empty when the
/// path has no extension.
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

/// Whether an extension (as produced by [`extension_of`]) is indexed.
pub fn is_acceptable(ext: &str) -> bool {
    ACCEPTED_EXTENSIONS.contains(&ext)
}

/// Category of a file under `root`: [`ROOT_CATEGORY`] for direct children,
/// otherwise the root-relative directory path in forward-slash form.
pub fn category_for(root: &Path, path: &Path) -> String {
    let dir = path.parent().unwrap_or(root);
    match paths::relative_normalized(root, dir) {
        Some(rel) if !rel.is_empty() => rel,
        _ => ROOT_CATEGORY.to_string(),
    }
}

/// MIME type for an accepted extension; video/mp4 for anything else.
pub fn mime_for(ext: &str) -> &'static str {
    match ext {
        ".mp3" => "audio/mpeg",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        _ => "video/mp4",
    }
}

/// Mtime of a stat result in milliseconds since the Unix epoch.
pub fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Coarse media classification used by the list/serve endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// mp4 (and the fallback for anything unrecognized)
    Video,
    /// mp3
    Audio,
    /// jpg, jpeg, png
    Photo,
}

impl MediaType {
    /// Classification for an extension. Unknown extensions classify as video.
    pub fn from_ext(ext: &str) -> Self {
        match ext {
            ".mp3" => MediaType::Audio,
            ".jpg" | ".jpeg" | ".png" => MediaType::Photo,
            _ => MediaType::Video,
        }
    }

    /// Single-letter protocol code: `v`, `a` or `p`.
    pub fn code(&self) -> &'static str {
        match self {
            MediaType::Video => "v",
            MediaType::Audio => "a",
            MediaType::Photo => "p",
        }
    }
}

/// Errors raised while describing a media file.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The file could not be stat'ed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ffprobe could not derive a duration. For cloud-mounted files this
    /// usually means the bytes are not materialized yet.
    #[error("duration probe failed: {0}")]
    Probe(#[from] ConvertError),
}

/// One indexed file as last observed on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFile {
    /// Absolute forward-slash-normalized path; unique across all sources.
    pub path: String,
    /// Lowercase extension including the dot.
    pub ext: String,
    /// File name without extension at the time of the last event.
    pub title: String,
    /// `ROOT` or the source-relative directory path.
    pub category: String,
    /// Size in bytes at last observation.
    pub length: u64,
    /// Mtime in milliseconds since the Unix epoch.
    pub date: i64,
    /// Playback duration in seconds; 0 for anything but mp4/mp3.
    pub duration: f64,
}

impl MediaFile {
    /// Stats `path` and builds a description of it, probing duration for
    /// mp4/mp3 files.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Io`] - The file could not be stat'ed
    /// - [`MediaError::Probe`] - ffprobe failed or produced no duration
    pub async fn probe(
        root: &Path,
        path: &Path,
        converter: &dyn MediaConverter,
    ) -> Result<Self, MediaError> {
        let metadata = tokio::fs::metadata(path).await?;
        Self::probe_with(root, path, metadata.len(), mtime_millis(&metadata), converter).await
    }

    /// Builds a description from already-known stat data, probing duration
    /// for mp4/mp3 files. Callers that stat first (to coalesce no-op change
    /// events) use this to avoid a second stat.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Probe`] - ffprobe failed or produced no duration
    pub async fn probe_with(
        root: &Path,
        path: &Path,
        length: u64,
        date: i64,
        converter: &dyn MediaConverter,
    ) -> Result<Self, MediaError> {
        let ext = extension_of(path);
        let duration = match ext.as_str() {
            ".mp4" | ".mp3" => converter.duration(path).await?,
            _ => 0.0,
        };

        Ok(Self {
            path: paths::normalize(path),
            title: paths::title_of(path),
            category: category_for(root, path),
            ext,
            length,
            date,
            duration,
        })
    }

    /// Classification derived from the extension.
    pub fn media_type(&self) -> MediaType {
        MediaType::from_ext(&self.ext)
    }

    /// MIME type derived from the extension.
    pub fn mime(&self) -> &'static str {
        mime_for(&self.ext)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::convert::simulation::SimulationConverter;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/m/A.MP4")), ".mp4");
        assert_eq!(extension_of(Path::new("/m/pic.JPeG")), ".jpeg");
        assert_eq!(extension_of(Path::new("/m/noext")), "");
    }

    #[test]
    fn test_acceptable_extensions() {
        assert!(is_acceptable(".mp4"));
        assert!(is_acceptable(".png"));
        assert!(!is_acceptable(".txt"));
        assert!(!is_acceptable(""));
    }

    #[test]
    fn test_category_for() {
        let root = Path::new("/m");
        assert_eq!(category_for(root, Path::new("/m/a.mp4")), "ROOT");
        assert_eq!(category_for(root, Path::new("/m/sub/a.mp4")), "sub");
        assert_eq!(category_for(root, Path::new("/m/sub/deep/a.mp4")), "sub/deep");
    }

    #[test]
    fn test_media_type_and_mime() {
        assert_eq!(MediaType::from_ext(".mp4").code(), "v");
        assert_eq!(MediaType::from_ext(".mp3").code(), "a");
        assert_eq!(MediaType::from_ext(".jpg").code(), "p");
        assert_eq!(MediaType::from_ext(".weird").code(), "v");
        assert_eq!(mime_for(".mp3"), "audio/mpeg");
        assert_eq!(mime_for(".png"), "image/png");
        assert_eq!(mime_for(".bin"), "video/mp4");
    }

    #[tokio::test]
    async fn test_probe_photo_skips_duration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("sub")).unwrap();
        let photo = root.join("sub/pic.png");
        std::fs::write(&photo, b"not really a png").unwrap();

        let converter = Arc::new(SimulationConverter::new());
        let file = MediaFile::probe(root, &photo, &*converter).await.unwrap();

        assert!(file.path.ends_with("sub/pic.png"));
        assert!(!file.path.contains('\\'));
        assert_eq!(file.ext, ".png");
        assert_eq!(file.title, "pic");
        assert_eq!(file.category, "sub");
        assert_eq!(file.length, 16);
        assert_eq!(file.duration, 0.0);
    }

    #[tokio::test]
    async fn test_probe_video_derives_duration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let video = root.join("a.mp4");
        std::fs::write(&video, b"fake video").unwrap();

        let converter = SimulationConverter::new().with_duration(42.5);
        let file = MediaFile::probe(root, &video, &converter).await.unwrap();

        assert_eq!(file.category, "ROOT");
        assert_eq!(file.duration, 42.5);
        assert!(file.date > 0);
    }

    #[tokio::test]
    async fn test_probe_failure_aborts_construction() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let video = root.join("a.mp4");
        std::fs::write(&video, b"fake video").unwrap();

        let converter = SimulationConverter::new();
        converter.fail_probe(&video);

        let result = MediaFile::probe(root, &video, &converter).await;
        assert!(matches!(result, Err(MediaError::Probe(_))));
    }
}
