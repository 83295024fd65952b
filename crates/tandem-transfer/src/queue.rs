//! In-process transfer queue with quota backpressure
//!
//! The [`TransferQueue`] admits upload/download/move/debris tasks,
//! orders them by priority, and gates quota-consuming work behind the
//! remaining remote allowance. A worker drives execution by calling
//! [`claim_next`](TransferQueue::claim_next) and reporting back through
//! [`complete`](TransferQueue::complete); everything else observes
//! progress through per-task watch channels.
//!
//! ## Quota gate
//!
//! When the next quota-consuming task would not fit in the remaining
//! allowance the gate trips: admission stops for quota-consuming work,
//! active quota-consuming tasks are paused, and the queue reports
//! itself quota-paused. Replenishing the allowance resumes everything
//! automatically; no user action is involved. Tasks that free space
//! (debris relocations, downloads, moves) keep flowing while the gate
//! is tripped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use tandem_core::domain::newtypes::{RootId, TaskId};
use tandem_core::domain::transfer::{TaskState, TransferTask};
use tandem_core::ports::transfer_queue::ITransferQueue;

use crate::error::TransferError;

// ============================================================================
// TransferQueue
// ============================================================================

struct Inner {
    tasks: HashMap<TaskId, TransferTask>,
    watchers: HashMap<TaskId, watch::Sender<TaskState>>,
    /// Remaining remote allowance in bytes; `None` means unlimited
    quota_remaining: Option<u64>,
    /// Tasks paused by the quota gate, as opposed to by the user
    quota_suspended: HashSet<TaskId>,
}

impl Inner {
    fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.set_state(state);
        }
        if let Some(tx) = self.watchers.get(&id) {
            // Receivers may all be gone; that is fine
            let _ = tx.send(state);
        }
    }

    fn active_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state() == TaskState::Active)
            .count()
    }

    /// Pause every active quota-consuming task and mark the gate tripped
    fn trip_quota_gate(&mut self) {
        let hit: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.state() == TaskState::Active && t.op().consumes_quota())
            .map(TransferTask::id)
            .collect();
        for id in hit {
            debug!(task = %id, "Pausing active task: quota exhausted");
            self.set_state(id, TaskState::Paused);
            self.quota_suspended.insert(id);
        }
    }
}

/// Priority transfer queue shared by the resolver and any user surface
pub struct TransferQueue {
    inner: Mutex<Inner>,
    quota_paused: AtomicBool,
    max_active: usize,
}

impl TransferQueue {
    /// Create a queue
    ///
    /// `quota_bytes` of zero means no remote allowance is enforced.
    pub fn new(quota_bytes: u64, max_active: usize) -> Self {
        info!(
            quota_bytes,
            max_active, "Creating transfer queue"
        );
        Self {
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                watchers: HashMap::new(),
                quota_remaining: (quota_bytes > 0).then_some(quota_bytes),
                quota_suspended: HashSet::new(),
            }),
            quota_paused: AtomicBool::new(false),
            max_active,
        }
    }

    /// Hand the highest-priority admissible queued task to a worker
    ///
    /// The returned task has already been marked `Active` and, if it
    /// consumes quota, its size deducted from the allowance. Returns
    /// `None` when nothing is admissible right now.
    pub async fn claim_next(&self) -> Option<TransferTask> {
        let mut inner = self.inner.lock().await;
        if inner.active_count() >= self.max_active {
            return None;
        }

        let mut queued: Vec<TransferTask> = inner
            .tasks
            .values()
            .filter(|t| t.state() == TaskState::Queued)
            .cloned()
            .collect();
        queued.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then(a.created_at().cmp(&b.created_at()))
        });

        for task in queued {
            if task.op().consumes_quota() {
                match inner.quota_remaining {
                    Some(remaining) if remaining < task.bytes() => {
                        if !self.quota_paused.swap(true, Ordering::AcqRel) {
                            warn!(
                                remaining,
                                needed = task.bytes(),
                                "Remote quota exhausted, pausing quota-consuming transfers"
                            );
                        }
                        inner.trip_quota_gate();
                        continue;
                    }
                    Some(remaining) => {
                        inner.quota_remaining = Some(remaining - task.bytes());
                    }
                    None => {}
                }
            }
            let id = task.id();
            inner.set_state(id, TaskState::Active);
            debug!(task = %id, priority = task.priority(), "Task claimed");
            return inner.tasks.get(&id).cloned();
        }
        None
    }

    /// Record a worker's terminal outcome for a task
    pub async fn complete(&self, id: TaskId, state: TaskState) -> Result<(), TransferError> {
        if !state.is_terminal() {
            return Err(TransferError::Domain(
                tandem_core::domain::errors::DomainError::ValidationFailed(format!(
                    "complete() requires a terminal state, got {state}"
                )),
            ));
        }
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get(&id).ok_or(TransferError::UnknownTask(id))?;
        if task.state().is_terminal() {
            return Err(TransferError::AlreadyTerminal(id, task.state()));
        }
        // A failed or cancelled upload never reached the remote; give
        // its reservation back.
        if state != TaskState::Completed && task.op().consumes_quota() {
            let bytes = task.bytes();
            if let Some(remaining) = inner.quota_remaining {
                inner.quota_remaining = Some(remaining + bytes);
            }
        }
        inner.set_state(id, state);
        debug!(task = %id, %state, "Task finished");
        Ok(())
    }

    /// Grow the remote allowance and resume quota-suspended work
    pub async fn replenish(&self, bytes: u64) {
        let mut inner = self.inner.lock().await;
        if let Some(remaining) = inner.quota_remaining {
            inner.quota_remaining = Some(remaining + bytes);
        }
        if self.quota_paused.swap(false, Ordering::AcqRel) {
            info!(bytes, "Quota replenished, resuming transfers");
            let suspended: Vec<TaskId> = inner.quota_suspended.drain().collect();
            for id in suspended {
                if inner.tasks.get(&id).map(TransferTask::state) == Some(TaskState::Paused) {
                    inner.set_state(id, TaskState::Queued);
                }
            }
        }
    }

    /// Current state of a task, if known
    pub async fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.inner.lock().await.tasks.get(&id).map(TransferTask::state)
    }
}

// ============================================================================
// ITransferQueue implementation
// ============================================================================

#[async_trait]
impl ITransferQueue for TransferQueue {
    async fn enqueue(&self, task: TransferTask) -> anyhow::Result<TaskId> {
        let id = task.id();
        let mut inner = self.inner.lock().await;
        let (tx, _rx) = watch::channel(task.state());
        debug!(
            task = %id,
            root = %task.root(),
            sync = task.is_sync_originated(),
            "Task enqueued"
        );
        inner.watchers.insert(id, tx);
        inner.tasks.insert(id, task);
        Ok(id)
    }

    async fn await_completion(&self, id: TaskId) -> anyhow::Result<TaskState> {
        let mut rx = {
            let inner = self.inner.lock().await;
            inner
                .watchers
                .get(&id)
                .ok_or(TransferError::UnknownTask(id))?
                .subscribe()
        };
        loop {
            let state = *rx.borrow();
            if state.is_terminal() {
                return Ok(state);
            }
            rx.changed().await?;
        }
    }

    async fn pause(&self, id: TaskId) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get(&id).ok_or(TransferError::UnknownTask(id))?;
        if task.state().is_terminal() {
            return Err(TransferError::AlreadyTerminal(id, task.state()).into());
        }
        inner.set_state(id, TaskState::Paused);
        // A user pause sticks until the user resumes it
        inner.quota_suspended.remove(&id);
        Ok(())
    }

    async fn resume(&self, id: TaskId) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get(&id).ok_or(TransferError::UnknownTask(id))?;
        if task.state() == TaskState::Paused {
            inner.set_state(id, TaskState::Queued);
            inner.quota_suspended.remove(&id);
        }
        Ok(())
    }

    async fn cancel(&self, id: TaskId) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get(&id).ok_or(TransferError::UnknownTask(id))?;
        if task.is_sync_originated() {
            return Err(TransferError::SyncOriginated(id).into());
        }
        if task.state().is_terminal() {
            return Err(TransferError::AlreadyTerminal(id, task.state()).into());
        }
        let refund = task.op().consumes_quota() && task.state() == TaskState::Active;
        let bytes = task.bytes();
        if refund {
            if let Some(remaining) = inner.quota_remaining {
                inner.quota_remaining = Some(remaining + bytes);
            }
        }
        info!(task = %id, "Task cancelled");
        inner.set_state(id, TaskState::Cancelled);
        inner.quota_suspended.remove(&id);
        Ok(())
    }

    async fn cancel_root(&self, root: RootId) -> anyhow::Result<u32> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<TaskId> = inner
            .tasks
            .values()
            .filter(|t| t.root() == root && !t.state().is_terminal())
            .map(TransferTask::id)
            .collect();
        let count = doomed.len() as u32;
        for id in doomed {
            inner.set_state(id, TaskState::Cancelled);
            inner.quota_suspended.remove(&id);
        }
        info!(%root, count, "Cancelled all tasks for root");
        Ok(count)
    }

    async fn set_priority(&self, id: TaskId, priority: u32) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(TransferError::UnknownTask(id))?;
        task.set_priority(priority).map_err(TransferError::Domain)?;
        Ok(())
    }

    fn is_quota_paused(&self) -> bool {
        self.quota_paused.load(Ordering::Acquire)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
