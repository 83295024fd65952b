//! Transfer subsystem errors

use tandem_core::domain::newtypes::TaskId;
use thiserror::Error;

/// Errors from the transfer queue and debris manager
#[derive(Debug, Error)]
pub enum TransferError {
    /// Handle does not correspond to any known task
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The task is sync-originated and the operation is per-task
    #[error("task {0} is sync-originated and cannot be cancelled individually")]
    SyncOriginated(TaskId),

    /// The task has already reached a terminal state
    #[error("task {0} is already {1}")]
    AlreadyTerminal(TaskId, tandem_core::domain::transfer::TaskState),

    /// Reordering refused by the task itself
    #[error(transparent)]
    Domain(#[from] tandem_core::domain::errors::DomainError),

    /// Debris relocation failed on the filesystem
    #[error("debris relocation of '{path}' failed")]
    Relocation {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}
