//! Filesystem helpers for the media directory.
//!
//! Intermediate files are named `{id}_temp_{role}.{ext}` and wrapped in
//! [`tempfile::TempPath`], which deletes them when dropped. That covers
//! early returns, errors and cancelled futures alike; a file only survives
//! by being persisted (renamed) to its final name.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::{Error, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_path("creating directory", path, e))
}

/// Path of an intermediate file for content `id`.
pub fn scratch_path(dir: &Path, id: &str, role: &str, ext: &str) -> PathBuf {
    dir.join(format!("{id}_temp_{role}.{ext}"))
}

/// A self-deleting intermediate file for content `id`.
pub async fn scratch_file(dir: &Path, id: &str, role: &str, ext: &str) -> Result<TempPath> {
    scratch_at(scratch_path(dir, id, role, ext)).await
}

/// Guard `path` as a self-deleting intermediate file.
///
/// Any stale file left at that path by an earlier, killed run is removed first.
pub async fn scratch_at(path: PathBuf) -> Result<TempPath> {
    remove_if_exists(&path).await;
    TempPath::try_from_path(path.clone())
        .map_err(|e| Error::io_path("resolving scratch file", &path, e))
}

/// Move a scratch file to its final location, replacing whatever is there.
///
/// On failure the scratch file is still deleted.
pub fn persist(scratch: TempPath, dest: &Path) -> std::io::Result<()> {
    scratch.persist(dest).map_err(|e| e.error)
}

/// Size of the file at `path` if it exists and is non-empty.
pub async fn non_empty_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

/// Remove a file, ignoring "not found".
pub async fn remove_if_exists(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scratch_path_naming() {
        let path = scratch_path(Path::new("media"), "abc", "audio", "mp4");
        assert_eq!(path, PathBuf::from("media/abc_temp_audio.mp4"));
    }

    #[tokio::test]
    async fn test_scratch_file_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = {
            let scratch = scratch_file(dir.path(), "abc", "video", "mp4").await.unwrap();
            std::fs::write(&scratch, b"data").unwrap();
            assert!(scratch.exists());
            scratch.to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_scratch_file_clears_stale_leftover() {
        let dir = TempDir::new().unwrap();
        let stale = scratch_path(dir.path(), "abc", "video", "mp4");
        std::fs::write(&stale, b"old").unwrap();
        let scratch = scratch_file(dir.path(), "abc", "video", "mp4").await.unwrap();
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_scratch_at_guards_an_absolute_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed_abc_temp_encode.mp4");
        std::fs::write(&path, b"stale").unwrap();

        let scratch = scratch_at(path.clone()).await.unwrap();
        assert!(scratch.is_absolute());
        assert!(!path.exists());

        std::fs::write(&scratch, b"encoded").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_persist_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("abc.mp4");
        std::fs::write(&dest, b"old").unwrap();

        let scratch = scratch_file(dir.path(), "abc", "video", "mp4").await.unwrap();
        let scratch_location = scratch.to_path_buf();
        std::fs::write(&scratch, b"new").unwrap();
        persist(scratch, &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        assert!(!scratch_location.exists());
    }

    #[tokio::test]
    async fn test_non_empty_size() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.jpg");
        let full = dir.path().join("full.jpg");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"12345").unwrap();

        assert_eq!(non_empty_size(&empty).await, None);
        assert_eq!(non_empty_size(&full).await, Some(5));
        assert_eq!(non_empty_size(&dir.path().join("missing")).await, None);
    }
}
