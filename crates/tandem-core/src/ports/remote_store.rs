//! Remote storage port (driven/secondary port)
//!
//! Interface to the remote tree: a change feed plus the handful of
//! mutations resolution needs. The actual transport, encryption, and
//! authentication live behind this seam and are out of scope here.

use async_trait::async_trait;

use crate::domain::change::ChangeSet;
use crate::domain::newtypes::{RemotePath, RootId};
use crate::domain::tree::{EntryKind, Identity};

/// A remote directory listing entry
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub path: RemotePath,
    pub kind: EntryKind,
    pub identity: Identity,
}

/// Remote tree operations
#[async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Drain the ordered change feed for one root since the last call
    ///
    /// Ordering is guaranteed within a root only.
    async fn changes(&self, root: RootId) -> anyhow::Result<ChangeSet>;

    /// List direct children of a remote folder
    async fn list(&self, folder: &RemotePath) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Whether anything exists at the path
    async fn exists(&self, path: &RemotePath) -> anyhow::Result<bool>;

    /// Move/rename a remote entry
    async fn move_entry(&self, from: &RemotePath, to: &RemotePath) -> anyhow::Result<()>;

    /// Relocate a remote entry into the remote debris area, returning
    /// the debris-relative path it landed at
    ///
    /// This is the only way the engine removes remote data.
    async fn move_to_debris(&self, path: &RemotePath) -> anyhow::Result<String>;

    /// Create a remote folder
    async fn create_folder(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Fetch content for fingerprint verification
    async fn read(&self, path: &RemotePath) -> anyhow::Result<Vec<u8>>;
}
