//! Debris manager
//!
//! Nothing a resolution removes is destroyed outright. Local objects
//! are renamed into a per-root holding directory, remote objects are
//! relocated by the remote store, and each relocation is recorded with
//! its original path so the user can recover it. One manager instance
//! is shared process-wide behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use tandem_core::domain::change::Side;
use tandem_core::domain::debris::DebrisEntry;
use tandem_core::domain::newtypes::{RemotePath, RootId};
use tandem_core::ports::local_filesystem::ILocalFileSystem;
use tandem_core::ports::remote_store::IRemoteStore;
use tandem_core::ports::state_repository::IStateRepository;

/// Name of the holding directory at the top of each local sync root
pub const LOCAL_DEBRIS_DIR: &str = ".tandem-debris";

/// Relocates would-be deletions into recoverable holding areas
pub struct DebrisManager {
    fs: Arc<dyn ILocalFileSystem>,
    remote: Arc<dyn IRemoteStore>,
    repository: Arc<dyn IStateRepository>,
    retention_days: u32,
}

impl DebrisManager {
    pub fn new(
        fs: Arc<dyn ILocalFileSystem>,
        remote: Arc<dyn IRemoteStore>,
        repository: Arc<dyn IStateRepository>,
        retention_days: u32,
    ) -> Self {
        Self {
            fs,
            remote,
            repository,
            retention_days,
        }
    }

    /// Move a local object into the root's holding directory
    ///
    /// The object keeps its relative path under a dated subfolder, so
    /// `docs/report.txt` lands at
    /// `.tandem-debris/2026-08-26/docs/report.txt`.
    pub async fn relocate_local(
        &self,
        root: RootId,
        local_root: &Path,
        rel_path: &str,
    ) -> anyhow::Result<DebrisEntry> {
        let dated = Utc::now().format("%Y-%m-%d").to_string();
        let dest = local_root.join(LOCAL_DEBRIS_DIR).join(&dated).join(rel_path);
        if let Some(parent) = dest.parent() {
            self.fs.create_folder(parent).await?;
        }
        self.fs.rename(&local_root.join(rel_path), &dest).await?;

        let entry = DebrisEntry::new(root, Side::Local, rel_path, dest.display().to_string());
        self.repository.save_debris(&entry).await?;
        debug!(%root, path = rel_path, to = %dest.display(), "Local object moved to debris");
        Ok(entry)
    }

    /// Relocate a remote object into the remote store's debris area
    pub async fn relocate_remote(
        &self,
        root: RootId,
        path: &RemotePath,
    ) -> anyhow::Result<DebrisEntry> {
        let relocated = self.remote.move_to_debris(path).await?;
        let entry = DebrisEntry::new(root, Side::Remote, path.as_str(), relocated);
        self.repository.save_debris(&entry).await?;
        debug!(%root, path = %path, to = entry.relocated_to(), "Remote object moved to debris");
        Ok(entry)
    }

    /// Move a held local object back to its original path
    ///
    /// Drops the record on success. Used to back out of a partially
    /// applied resolution, so the held copy becomes the original again.
    pub async fn restore_local(
        &self,
        entry: &DebrisEntry,
        local_root: &Path,
    ) -> anyhow::Result<()> {
        self.fs
            .rename(
                Path::new(entry.relocated_to()),
                &local_root.join(entry.original_path()),
            )
            .await?;
        self.repository.delete_debris(entry.id()).await?;
        debug!(path = entry.original_path(), "Local object restored from debris");
        Ok(())
    }

    /// Move a held remote object back to its original path
    pub async fn restore_remote(&self, entry: &DebrisEntry) -> anyhow::Result<()> {
        let held = RemotePath::new(entry.relocated_to().to_string())?;
        let original = RemotePath::new(entry.original_path().to_string())?;
        self.remote.move_entry(&held, &original).await?;
        self.repository.delete_debris(entry.id()).await?;
        debug!(path = entry.original_path(), "Remote object restored from debris");
        Ok(())
    }

    /// Remove every entry older than the retention window
    pub async fn purge_expired(&self) -> anyhow::Result<u32> {
        let now = Utc::now();
        let expired: Vec<DebrisEntry> = self
            .repository
            .load_debris()
            .await?
            .into_iter()
            .filter(|e| e.is_expired(self.retention_days, now))
            .collect();
        let purged = self.discard(expired).await?;
        if purged > 0 {
            info!(purged, retention_days = self.retention_days, "Purged expired debris");
        }
        Ok(purged)
    }

    /// Discard all held debris, regardless of age
    pub async fn empty(&self) -> anyhow::Result<u32> {
        let all = self.repository.load_debris().await?;
        let purged = self.discard(all).await?;
        info!(purged, "Emptied debris");
        Ok(purged)
    }

    async fn discard(&self, entries: Vec<DebrisEntry>) -> anyhow::Result<u32> {
        let mut count = 0u32;
        for entry in entries {
            if entry.side() == Side::Local {
                // The record is dropped even if the file is already
                // gone; a stale record is worse than a missed file.
                if let Err(err) = self.fs.remove_file(Path::new(entry.relocated_to())).await {
                    warn!(path = entry.relocated_to(), error = %err, "Debris file removal failed");
                }
            }
            self.repository.delete_debris(entry.id()).await?;
            count += 1;
        }
        Ok(count)
    }
}
