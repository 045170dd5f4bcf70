//! Path normalization helpers.
//!
//! Every path the engine stores or emits uses `/` as separator, including on
//! Windows. Keys in the file cache and the metadata store are the normalized
//! string form produced here.

use std::path::{Path, PathBuf};

/// Normalizes a path to its forward-slash string form.
pub fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Returns `path` relative to `base`, or `None` if `path` is not under `base`.
pub fn relative(base: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(Path::to_path_buf)
}

/// Returns the root-relative forward-slash form of `path`, or `None` if
/// `path` is not under `base`.
pub fn relative_normalized(base: &Path, path: &Path) -> Option<String> {
    relative(base, path).map(|rel| normalize(&rel))
}

/// File stem of a path as an owned string; empty when the path has none.
pub fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name of a path as an owned string; empty when the path has none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Creates the parent directory of `path` (and any missing ancestors).
///
/// # Errors
///
/// - `std::io::Error` - If the directory hierarchy could not be created
pub async fn ensure_parent_dir(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
