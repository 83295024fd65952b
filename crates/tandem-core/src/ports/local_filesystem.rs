//! Local filesystem port (driven/secondary port)
//!
//! Interface for the local-side file operations the resolution engine
//! and debris manager need. The scanner has its own adapter; this port
//! exists so resolution logic can be tested against a fake filesystem.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Writes must be atomic (write-to-temp + rename) so a crash mid-apply
//!   never leaves the original observably modified.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::tree::EntryKind;

/// Snapshot of a path's state on the local filesystem
#[derive(Debug, Clone)]
pub struct FsEntryState {
    /// Whether anything exists at the path
    pub exists: bool,
    /// File or folder, if it exists
    pub kind: Option<EntryKind>,
    /// Size in bytes (0 for folders or non-existent paths)
    pub size: u64,
    /// Last modification time, if available
    pub modified: Option<DateTime<Utc>>,
}

impl FsEntryState {
    /// A state representing a non-existent path
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            exists: false,
            kind: None,
            size: 0,
            modified: None,
        }
    }

    /// True if the path exists and is a regular file
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.exists && self.kind == Some(EntryKind::File)
    }
}

/// Local filesystem operations used during resolution
#[async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Inspect a path without following symlinks
    async fn state(&self, path: &Path) -> anyhow::Result<FsEntryState>;

    /// Rename/move within the same filesystem
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Create a folder, including missing parents
    async fn create_folder(&self, path: &Path) -> anyhow::Result<()>;

    /// Remove a file; used only for temporary artifacts, never for user
    /// data (user data goes through debris)
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Read full file contents
    async fn read(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Atomically replace `path` with `contents`
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()>;

    /// List direct children of a folder
    async fn list(&self, path: &Path) -> anyhow::Result<Vec<PathBuf>>;
}
