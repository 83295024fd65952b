//! Sync root configuration entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{LocalPath, RemotePath, RootId};

/// Direction policy of a sync root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Bidirectional: both sides writable
    Sync,
    /// Remote is a read-only mirror of local; local is canonical
    Backup,
}

/// How stalled issues with a safe default are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    /// Categories with a safe default resolve automatically
    Smart,
    /// Every issue awaits an explicit user decision
    Advanced,
}

impl std::fmt::Display for SolveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveMode::Smart => write!(f, "smart"),
            SolveMode::Advanced => write!(f, "advanced"),
        }
    }
}

/// A configured local↔remote directory pairing
///
/// The solve mode is carried here and passed *by value* into the
/// classifier and resolver at call time; nothing reads it from shared
/// process state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRoot {
    id: RootId,
    local_root: LocalPath,
    remote_root: RemotePath,
    mode: SyncMode,
    solve_mode: SolveMode,
    /// False once the root has been disabled (fatal error or backup
    /// keep-local); a disabled root neither scans nor transfers
    active: bool,
    /// Why the root was disabled, if it was
    disabled_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl SyncRoot {
    /// Create an active sync root
    pub fn new(
        local_root: LocalPath,
        remote_root: RemotePath,
        mode: SyncMode,
        solve_mode: SolveMode,
    ) -> Self {
        Self {
            id: RootId::new(),
            local_root,
            remote_root,
            mode,
            solve_mode,
            active: true,
            disabled_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn local_root(&self) -> &LocalPath {
        &self.local_root
    }

    pub fn remote_root(&self) -> &RemotePath {
        &self.remote_root
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn solve_mode(&self) -> SolveMode {
        self.solve_mode
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Change the solve mode; affects only future auto-transitions
    pub fn set_solve_mode(&mut self, mode: SolveMode) {
        self.solve_mode = mode;
    }

    /// Disable the root, recording why
    ///
    /// Used for the fatal error class (storage exhaustion, corrupted
    /// state database) and for keep-local on a Backup root.
    pub fn disable(&mut self, reason: impl Into<String>) {
        self.active = false;
        self.disabled_reason = Some(reason.into());
    }
}
