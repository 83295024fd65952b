//! Transfer queue port (driven/secondary port)
//!
//! The resolution engine enqueues work and awaits completion through
//! this seam; the queue implementation owns prioritization, quota
//! backpressure, and the sync-originated cancellation rules.

use async_trait::async_trait;

use crate::domain::newtypes::{RootId, TaskId};
use crate::domain::transfer::{TaskState, TransferTask};

/// Transfer queue operations
#[async_trait]
pub trait ITransferQueue: Send + Sync {
    /// Admit a task; returns its handle
    async fn enqueue(&self, task: TransferTask) -> anyhow::Result<TaskId>;

    /// Suspend until the task reaches a terminal state
    ///
    /// This is what makes `apply()` a blocking logical operation: the
    /// issue's state must reflect the real transfer outcome.
    async fn await_completion(&self, id: TaskId) -> anyhow::Result<TaskState>;

    /// Pause a task (legal for sync-originated tasks too)
    async fn pause(&self, id: TaskId) -> anyhow::Result<()>;

    /// Resume a paused task
    async fn resume(&self, id: TaskId) -> anyhow::Result<()>;

    /// Cancel a single task
    ///
    /// # Errors
    ///
    /// Rejects sync-originated tasks; those are cancelled only as a
    /// group via [`cancel_root`](Self::cancel_root).
    async fn cancel(&self, id: TaskId) -> anyhow::Result<()>;

    /// Atomically cancel every non-terminal task of a root, returning
    /// how many were cancelled
    async fn cancel_root(&self, root: RootId) -> anyhow::Result<u32>;

    /// Reorder a user-initiated task
    async fn set_priority(&self, id: TaskId, priority: u32) -> anyhow::Result<()>;

    /// True while quota exhaustion is holding admissions back
    fn is_quota_paused(&self) -> bool;
}
