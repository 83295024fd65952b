//! Transfer task entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{RootId, TaskId};

/// What a transfer task does when executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransferOp {
    /// Upload a local file to the remote path
    Upload { local: String, remote: String },
    /// Download a remote file to the local path
    Download { remote: String, local: String },
    /// Move/rename on the remote side
    MoveRemote { from: String, to: String },
    /// Move/rename on the local side
    MoveLocal { from: String, to: String },
    /// Relocate a remote object into remote debris
    DebrisRemote { path: String },
    /// Relocate a local object into local debris
    DebrisLocal { path: String },
}

impl TransferOp {
    /// True for ops that add bytes to remote storage (quota-relevant)
    #[must_use]
    pub fn consumes_quota(&self) -> bool {
        matches!(self, TransferOp::Upload { .. })
    }
}

/// Lifecycle state of a transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// True once the task can no longer change state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Active => "active",
            TaskState::Paused => "paused",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A queued upload/download/move/debris operation
///
/// Sync-originated tasks cannot be individually cancelled; cancelling
/// half of a sync operation could leave the trees un-reconcilable.
/// Removing the owning root cancels them as a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    id: TaskId,
    root: RootId,
    op: TransferOp,
    /// Lower value runs sooner; user tasks may be reordered
    priority: u32,
    state: TaskState,
    sync_originated: bool,
    /// Approximate payload size, used by the quota gate
    bytes: u64,
    created_at: DateTime<Utc>,
}

impl TransferTask {
    /// Default priority for user-initiated transfers
    pub const USER_PRIORITY: u32 = 100;
    /// Sync-originated tasks are always lowest-touch
    pub const SYNC_PRIORITY: u32 = 1_000;

    /// Create a queued sync-originated task
    pub fn sync_originated(root: RootId, op: TransferOp, bytes: u64) -> Self {
        Self {
            id: TaskId::new(),
            root,
            op,
            priority: Self::SYNC_PRIORITY,
            state: TaskState::Queued,
            sync_originated: true,
            bytes,
            created_at: Utc::now(),
        }
    }

    /// Create a queued user-initiated task
    pub fn user_initiated(root: RootId, op: TransferOp, bytes: u64) -> Self {
        Self {
            id: TaskId::new(),
            root,
            op,
            priority: Self::USER_PRIORITY,
            state: TaskState::Queued,
            sync_originated: false,
            bytes,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn op(&self) -> &TransferOp {
        &self.op
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_sync_originated(&self) -> bool {
        self.sync_originated
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Reorder a user-initiated task
    ///
    /// # Errors
    ///
    /// Sync-originated tasks cannot be reprioritized.
    pub fn set_priority(&mut self, priority: u32) -> Result<(), DomainError> {
        if self.sync_originated {
            return Err(DomainError::ValidationFailed(
                "sync-originated tasks cannot be reordered".to_string(),
            ));
        }
        self.priority = priority;
        Ok(())
    }

    /// Force a state; callers are the queue, which owns the legality
    pub fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_op() -> TransferOp {
        TransferOp::Upload {
            local: "a.txt".to_string(),
            remote: "/a.txt".to_string(),
        }
    }

    #[test]
    fn test_sync_task_defaults() {
        let task = TransferTask::sync_originated(RootId::new(), upload_op(), 128);
        assert!(task.is_sync_originated());
        assert_eq!(task.priority(), TransferTask::SYNC_PRIORITY);
        assert_eq!(task.state(), TaskState::Queued);
    }

    #[test]
    fn test_sync_task_cannot_be_reordered() {
        let mut task = TransferTask::sync_originated(RootId::new(), upload_op(), 128);
        assert!(task.set_priority(1).is_err());
    }

    #[test]
    fn test_user_task_reorder() {
        let mut task = TransferTask::user_initiated(RootId::new(), upload_op(), 128);
        task.set_priority(5).unwrap();
        assert_eq!(task.priority(), 5);
    }

    #[test]
    fn test_quota_relevance() {
        assert!(upload_op().consumes_quota());
        assert!(!TransferOp::DebrisRemote {
            path: "x".to_string()
        }
        .consumes_quota());
    }
}
