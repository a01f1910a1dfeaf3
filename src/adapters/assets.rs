//! Asset storage.
//!
//! Uploaded files are referenced from the database by relative path. The
//! [`AssetStore`] trait is the only way the core touches them; removal is
//! idempotent so cleanup can be retried or raced without harm.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of removing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    /// Nothing was there; not an error
    AlreadyAbsent,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persists `bytes` and returns the relative path to reference them by.
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String>;

    /// Removes the file at `path`. A missing file yields `Removal::AlreadyAbsent`.
    async fn remove(&self, path: &str) -> Result<Removal>;
}

/// Files on the local disk, under a root directory.
///
/// New uploads are named by the SHA-256 of their content, so storing the same
/// bytes twice yields the same path.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    upload_dir: String,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, upload_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            upload_dir: upload_dir.into(),
        }
    }

    /// Maps a stored relative path onto the disk, refusing anything that
    /// could escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || escapes {
            return Err(Error::validation(
                "path",
                format!("'{path}' is not a relative asset path"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

fn normalize_extension(extension: &str) -> Result<String> {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::validation("extension", format!("unsupported file extension '{extension}'")));
    }
    Ok(ext)
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let ext = normalize_extension(extension)?;
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let name = format!("{:x}.{ext}", hasher.finalize());

        let relative = format!("{}/{name}", self.upload_dir.trim_end_matches('/'));
        let target = self.resolve(&relative)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        if tokio::fs::try_exists(&target).await? {
            debug!(path = %relative, "Asset already stored");
        } else {
            tokio::fs::write(&target, bytes).await?;
            debug!(path = %relative, size = bytes.len(), "Asset stored");
        }
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> Result<Removal> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(Removal::Deleted),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::AlreadyAbsent),
            Err(source) => Err(Error::AssetCleanup {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Outcome of a post-commit cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub already_absent: usize,
    /// Paths that could not be removed and were left on disk
    pub failed: Vec<String>,
}

/// Removes files that the committed database state no longer references.
///
/// Runs sequentially and never fails: errors other than "already absent" are
/// logged and reported, since the database is already the source of truth.
pub async fn remove_orphans(store: &dyn AssetStore, paths: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    let mut seen: Vec<&str> = Vec::with_capacity(paths.len());

    for path in paths {
        if path.trim().is_empty() || seen.contains(&path.as_str()) {
            continue;
        }
        seen.push(path);

        match store.remove(path).await {
            Ok(Removal::Deleted) => {
                report.deleted += 1;
                info!(path = %path, "Orphaned asset removed");
            }
            Ok(Removal::AlreadyAbsent) => {
                report.already_absent += 1;
                debug!(path = %path, "Orphaned asset was already gone");
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to remove orphaned asset; leaving it on disk");
                report.failed.push(path.clone());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::RecordingAssetStore;

    #[tokio::test]
    async fn test_store_is_content_addressed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalAssetStore::new(dir.path(), "uploads");

        let first = store.store(b"logo-bytes", "WEBP").await?;
        let second = store.store(b"logo-bytes", ".webp").await?;
        let other = store.store(b"other-bytes", "webp").await?;

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("uploads/"));
        assert!(first.ends_with(".webp"));
        assert_eq!(std::fs::read(dir.path().join(&first))?, b"logo-bytes");
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalAssetStore::new(dir.path(), "uploads");
        let path = store.store(b"bytes", "png").await?;

        assert_eq!(store.remove(&path).await?, Removal::Deleted);
        assert_eq!(store.remove(&path).await?, Removal::AlreadyAbsent);
        assert_eq!(store.remove("uploads/never-existed.png").await?, Removal::AlreadyAbsent);
        Ok(())
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let store = LocalAssetStore::new("/srv/assets", "uploads");
        for path in ["../etc/passwd", "/etc/passwd", "uploads/../../x", ""] {
            let err = store.remove(path).await.unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "accepted {path}");
        }
    }

    #[tokio::test]
    async fn test_bad_extension_is_refused() {
        let store = LocalAssetStore::new("/srv/assets", "uploads");
        assert!(store.store(b"x", "tar.gz").await.is_err());
        assert!(store.store(b"x", "").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_orphans_reports_without_failing() {
        let store = RecordingAssetStore::with_existing(&["a.webp", "b.webp"]).failing_on("b.webp");
        let paths = vec![
            "a.webp".to_string(),
            "a.webp".to_string(),
            "b.webp".to_string(),
            "gone.webp".to_string(),
        ];

        let report = remove_orphans(&store, &paths).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.already_absent, 1);
        assert_eq!(report.failed, vec!["b.webp"]);
        assert_eq!(store.removal_attempts(), vec!["a.webp", "b.webp", "gone.webp"]);
    }
}
