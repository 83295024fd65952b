//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file
//! operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: Uses write-to-temp + rename to avoid partial
//!   writes on crash or power loss.
//! - **No symlink traversal**: `state` stats the link itself, so a
//!   symlink never masquerades as its target.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::{debug, instrument};

use tandem_core::domain::tree::EntryKind;
use tandem_core::ports::local_filesystem::{FsEntryState, ILocalFileSystem};

/// Adapter that bridges the [`ILocalFileSystem`] port to the real
/// filesystem.
///
/// Zero-sized because all operations derive their context from the path
/// arguments; sync-root configuration lives at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new `LocalFs` adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFs {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn state(&self, path: &Path) -> anyhow::Result<FsEntryState> {
        // symlink_metadata so the link itself is inspected
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(FsEntryState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let kind = if metadata.is_file() {
            Some(EntryKind::File)
        } else if metadata.is_dir() {
            Some(EntryKind::Folder)
        } else {
            None
        };

        let modified = metadata.modified().ok().and_then(|st| {
            st.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        });

        Ok(FsEntryState {
            exists: true,
            kind,
            size: metadata.len(),
            modified,
        })
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(from, to).await?;
        debug!("rename complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_folder(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::remove_file(path).await?;
        debug!("remove complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, contents), fields(path = %path.display(), bytes = contents.len()))]
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Temp file in the same directory so the rename is atomic
        // (same filesystem)
        let tmp_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(path).await?;
        while let Some(entry) = reader.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_distinguishes_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();

        let fs = LocalFs::new();
        let file_state = fs.state(&file).await.unwrap();
        assert!(file_state.is_file());
        assert_eq!(file_state.size, 5);
        assert!(file_state.modified.is_some());

        let dir_state = fs.state(dir.path()).await.unwrap();
        assert_eq!(dir_state.kind, Some(EntryKind::Folder));

        let missing = fs.state(&dir.path().join("nope")).await.unwrap();
        assert!(!missing.exists);
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.txt");

        let fs = LocalFs::new();
        fs.write_atomic(&target, b"first").await.unwrap();
        fs.write_atomic(&target, b"second").await.unwrap();

        assert_eq!(fs.read(&target).await.unwrap(), b"second");
        // No temp artifact left behind
        let listing = fs.list(target.parent().unwrap()).await.unwrap();
        assert_eq!(listing, vec![target]);
    }

    #[tokio::test]
    async fn test_rename_creates_destination_parent() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.txt");
        tokio::fs::write(&from, b"x").await.unwrap();

        let fs = LocalFs::new();
        let to = dir.path().join("sub").join("b.txt");
        fs.rename(&from, &to).await.unwrap();

        assert!(!fs.state(&from).await.unwrap().exists);
        assert!(fs.state(&to).await.unwrap().is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_state_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.txt");
        tokio::fs::write(&target, b"data").await.unwrap();
        let link = dir.path().join("link.txt");
        tokio::fs::symlink(&target, &link).await.unwrap();

        let fs = LocalFs::new();
        let state = fs.state(&link).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.kind, None, "A symlink is neither file nor folder");
    }
}
