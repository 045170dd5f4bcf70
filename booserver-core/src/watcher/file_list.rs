//! Comparable snapshots of the files under a root.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::media::paths;

/// Type alias for the recursive async scan future
type ScanFuture<'a> = Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send + 'a>>;

/// Snapshot of the root-relative paths of the regular files under a root.
///
/// Paths are compared by exact string equality of their forward-slash
/// relative form, so two lists taken over different roots can be diffed.
#[derive(Debug, Clone)]
pub struct ComparableFileList {
    root: PathBuf,
    entries: BTreeSet<String>,
}

/// Result of diffing two file lists, resolved back to absolute paths.
#[derive(Debug, Clone)]
pub struct FileListDiff {
    /// Absolute paths present only in the list `compare` was called on.
    pub only_in_src: Vec<PathBuf>,
    /// Absolute paths present only in the other list.
    pub only_in_dst: Vec<PathBuf>,
}

impl ComparableFileList {
    /// Captures the set of regular files under `root`.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the root or one of its directories could not
    ///   be read
    pub async fn create(root: &Path, recursive: bool) -> Result<Self, std::io::Error> {
        let mut list = Self {
            root: root.to_path_buf(),
            entries: BTreeSet::new(),
        };
        scan_into(root.to_path_buf(), recursive, &mut list).await?;
        Ok(list)
    }

    /// Root this snapshot was taken over.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of captured files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot captured no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the snapshot contains `absolute`.
    pub fn contains(&self, absolute: &Path) -> bool {
        match paths::relative_normalized(&self.root, absolute) {
            Some(rel) => self.entries.contains(&rel),
            None => false,
        }
    }

    /// Removes `absolute` from the snapshot; silently does nothing when the
    /// path is absent or outside the root.
    pub fn remove(&mut self, absolute: &Path) {
        if let Some(rel) = paths::relative_normalized(&self.root, absolute) {
            self.entries.remove(&rel);
        }
    }

    /// Set-difference against another snapshot, each side resolved against
    /// its own root.
    pub fn compare(&self, other: &ComparableFileList) -> FileListDiff {
        let only_in_src = self
            .entries
            .difference(&other.entries)
            .map(|rel| self.root.join(rel))
            .collect();
        let only_in_dst = other
            .entries
            .difference(&self.entries)
            .map(|rel| other.root.join(rel))
            .collect();

        FileListDiff {
            only_in_src,
            only_in_dst,
        }
    }
}

fn scan_into<'a>(dir: PathBuf, recursive: bool, list: &'a mut ComparableFileList) -> ScanFuture<'a> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                if recursive && !should_skip_directory(&path) {
                    scan_into(path, recursive, list).await?;
                }
            } else if file_type.is_file()
                && let Some(rel) = paths::relative_normalized(&list.root, &path)
            {
                list.entries.insert(rel);
            }
        }

        Ok(())
    })
}

/// System directories never worth descending into.
fn should_skip_directory(path: &Path) -> bool {
    if let Some(dir_name) = path.file_name().and_then(|name| name.to_str()) {
        matches!(dir_name, ".DS_Store" | "Thumbs.db" | ".Trash")
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn populated_root() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("a.mp4"), b"a").unwrap();
        std::fs::write(root.join("notes.txt"), b"n").unwrap();
        std::fs::write(root.join("sub/b.mp4"), b"b").unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_create_recursive() {
        let temp_dir = populated_root().await;
        let list = ComparableFileList::create(temp_dir.path(), true).await.unwrap();

        assert_eq!(list.len(), 3);
        assert!(list.contains(&temp_dir.path().join("sub/b.mp4")));
    }

    #[tokio::test]
    async fn test_create_non_recursive_skips_subdirectories() {
        let temp_dir = populated_root().await;
        let list = ComparableFileList::create(temp_dir.path(), false).await.unwrap();

        assert_eq!(list.len(), 2);
        assert!(!list.contains(&temp_dir.path().join("sub/b.mp4")));
    }

    #[tokio::test]
    async fn test_compare_resolves_against_each_root() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        std::fs::write(src_dir.path().join("shared.mp4"), b"s").unwrap();
        std::fs::write(src_dir.path().join("fresh.mp4"), b"f").unwrap();
        std::fs::write(dst_dir.path().join("shared.mp4"), b"s").unwrap();
        std::fs::write(dst_dir.path().join("gone.mp4"), b"g").unwrap();

        let src = ComparableFileList::create(src_dir.path(), true).await.unwrap();
        let dst = ComparableFileList::create(dst_dir.path(), true).await.unwrap();
        let diff = src.compare(&dst);

        assert_eq!(diff.only_in_src, vec![src_dir.path().join("fresh.mp4")]);
        assert_eq!(diff.only_in_dst, vec![dst_dir.path().join("gone.mp4")]);
    }

    #[tokio::test]
    async fn test_remove_is_tolerant() {
        let temp_dir = populated_root().await;
        let mut list = ComparableFileList::create(temp_dir.path(), true).await.unwrap();

        list.remove(&temp_dir.path().join("a.mp4"));
        assert_eq!(list.len(), 2);

        // Absent and foreign paths are silently ignored.
        list.remove(&temp_dir.path().join("a.mp4"));
        list.remove(Path::new("/somewhere/else.mp4"));
        assert_eq!(list.len(), 2);
    }
}
