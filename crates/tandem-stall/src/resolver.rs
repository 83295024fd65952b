//! Resolution engine
//!
//! Executes resolution actions against the local filesystem, the remote
//! store, and the transfer queue. Discarding side effects always route
//! through debris; the engine never hard-deletes user data. An apply is
//! a blocking logical operation: it suspends on the transfer queue
//! until the enqueued work reaches a terminal state, so the issue's
//! recorded outcome reflects reality.
//!
//! Cancellation is cooperative: the caller's `CancellationToken` aborts
//! the apply between side effects, reverting the issue to `Detected`.
//! Temp artifacts may be left behind for cleanup; the original is never
//! left observably modified.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tandem_core::domain::change::Side;
use tandem_core::domain::issue::{ActionKind, IssueState, Outcome, StallCategory, StalledIssue};
use tandem_core::domain::newtypes::{IssueId, RemotePath, TaskId};
use tandem_core::domain::sync_root::{SyncMode, SyncRoot};
use tandem_core::domain::transfer::{TaskState, TransferOp, TransferTask};
use tandem_core::domain::tree::Identity;
use tandem_core::ports::local_filesystem::ILocalFileSystem;
use tandem_core::ports::remote_store::IRemoteStore;
use tandem_core::ports::transfer_queue::ITransferQueue;
use tandem_transfer::DebrisManager;

use crate::error::StallError;
use crate::namer::StallNamer;

/// Result of applying one action to a batch of issues
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub applied: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

// ============================================================================
// Action catalog
// ============================================================================

/// The actions offered for a category on a root of the given mode
///
/// Every category offers `Ignore`. The solve mode never changes this
/// set; it only decides whether a safe default is applied unprompted.
#[must_use]
pub fn list_actions(category: &StallCategory, mode: SyncMode) -> Vec<ActionKind> {
    use ActionKind::*;
    let mut actions = match category {
        StallCategory::NameConflict { .. } => {
            vec![RenameAll, MergeFolders, RemoveDuplicates, KeepMostRecent]
        }
        StallCategory::LocalAndRemoteChanged { .. } => {
            if mode == SyncMode::Backup {
                vec![KeepLocal]
            } else {
                vec![KeepLocal, KeepRemote, KeepBoth, KeepMostRecent]
            }
        }
        StallCategory::MoveOrRenameCannotOccur { .. } => vec![ChooseLocal, ChooseRemote],
        StallCategory::FolderMatchedAgainstFile { .. } => vec![KeepLocal, KeepRemote],
        StallCategory::FingerprintMissing { .. } => vec![DownloadAndVerify],
        StallCategory::CannotCreateFolder { .. }
        | StallCategory::CannotPerformDeletion { .. }
        | StallCategory::FilesystemErrorDuringOperation { .. } => vec![Retry],
        StallCategory::BackupExternallyModified { .. } => vec![KeepLocal],
        // Transient and structural categories clear on their own or
        // need an out-of-band fix; nothing to apply
        StallCategory::DeleteOrMoveWaitingOnScan { .. }
        | StallCategory::DeleteWaitingOnMove { .. }
        | StallCategory::ExceedsTreeDepth { .. }
        | StallCategory::SpecialOrHardLink { .. }
        | StallCategory::UnknownTemporary { .. } => Vec::new(),
    };
    actions.push(Ignore);
    actions
}

/// The safe default Smart mode applies without asking, if any
#[must_use]
pub fn smart_default(category: &StallCategory) -> Option<ActionKind> {
    match category {
        StallCategory::LocalAndRemoteChanged { .. } => Some(ActionKind::KeepMostRecent),
        StallCategory::NameConflict { .. } => Some(ActionKind::RenameAll),
        StallCategory::FingerprintMissing { .. } => Some(ActionKind::DownloadAndVerify),
        _ => None,
    }
}

// ============================================================================
// StallResolver
// ============================================================================

/// Applies resolution actions through the ports
pub struct StallResolver {
    fs: Arc<dyn ILocalFileSystem>,
    remote: Arc<dyn IRemoteStore>,
    queue: Arc<dyn ITransferQueue>,
    debris: Arc<DebrisManager>,
}

impl StallResolver {
    pub fn new(
        fs: Arc<dyn ILocalFileSystem>,
        remote: Arc<dyn IRemoteStore>,
        queue: Arc<dyn ITransferQueue>,
        debris: Arc<DebrisManager>,
    ) -> Self {
        Self {
            fs,
            remote,
            queue,
            debris,
        }
    }

    /// Apply an action to an issue, mutating it to its final state
    ///
    /// Idempotent on resolved issues: re-applying returns the recorded
    /// outcome without touching anything. On cancellation mid-apply the
    /// issue reverts to `Detected` and `StallError::Cancelled` is
    /// returned; `root` is only mutated by keep-local on a Backup root,
    /// which disables it.
    pub async fn apply(
        &self,
        issue: &mut StalledIssue,
        root: &mut SyncRoot,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        if issue.state() == IssueState::Resolved {
            debug!(issue = %issue.id(), "Already resolved, returning recorded outcome");
            return Ok(issue
                .outcome()
                .cloned()
                .unwrap_or_else(|| Outcome::summary("already resolved")));
        }

        if !list_actions(issue.category(), root.mode()).contains(&action) {
            return Err(StallError::ActionNotApplicable {
                issue: issue.id(),
                action,
            });
        }

        if action == ActionKind::Ignore {
            issue.transition_to(IssueState::Ignored)?;
            info!(issue = %issue.id(), "Issue ignored");
            return Ok(Outcome::summary("ignored"));
        }

        issue.set_chosen_action(action);
        issue.transition_to(IssueState::Applying)?;
        info!(
            issue = %issue.id(),
            category = issue.category().label(),
            %action,
            "Applying resolution"
        );

        let category = issue.category().clone();
        let result = self
            .execute(issue.id(), &category, root, action, token)
            .await;

        match result {
            Err(StallError::Cancelled(id)) => {
                warn!(issue = %issue.id(), "Resolution cancelled mid-apply");
                issue.transition_to(IssueState::Detected)?;
                Err(StallError::Cancelled(id))
            }
            Ok(outcome) => {
                if outcome.root_disabled {
                    root.disable(format!(
                        "kept local data over externally modified backup ({})",
                        category.label()
                    ));
                }
                issue.mark_resolved(outcome.clone());
                info!(issue = %issue.id(), summary = %outcome.summary, "Issue resolved");
                Ok(outcome)
            }
            Err(err) => {
                warn!(issue = %issue.id(), error = %err, "Resolution failed");
                issue.mark_failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Apply one action to many issues; partial success is normal
    pub async fn apply_batch(
        &self,
        issues: &mut [StalledIssue],
        root: &mut SyncRoot,
        action: ActionKind,
        token: &CancellationToken,
    ) -> BatchOutcome {
        let mut out = BatchOutcome::default();
        for issue in issues.iter_mut() {
            match self.apply(issue, root, action, token).await {
                Ok(_) => out.applied += 1,
                Err(err) => {
                    out.failed += 1;
                    out.errors.push(format!("{}: {err}", issue.id()));
                }
            }
        }
        out
    }

    /// Cancellation is honored at safe points: the token is checked
    /// between discrete side effects, and a transfer that follows a
    /// debris relocation restores the relocated object if it is
    /// cancelled, so the original is never left observably modified.
    async fn execute(
        &self,
        id: IssueId,
        category: &StallCategory,
        root: &SyncRoot,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        match category {
            StallCategory::LocalAndRemoteChanged {
                path,
                local,
                remote,
            } => {
                self.resolve_both_changed(id, root, path, local, remote, action, token)
                    .await
            }
            StallCategory::NameConflict {
                local_paths,
                remote_paths,
                ..
            } => {
                self.resolve_name_conflict(id, root, local_paths, remote_paths, action, token)
                    .await
            }
            StallCategory::MoveOrRenameCannotOccur {
                local_target,
                remote_target,
                ..
            } => {
                self.resolve_move_conflict(id, root, local_target, remote_target, action, token)
                    .await
            }
            StallCategory::FolderMatchedAgainstFile { path, .. } => {
                self.resolve_kind_mismatch(id, root, path, action, token).await
            }
            StallCategory::FingerprintMissing { path, side } => {
                self.resolve_fingerprint_missing(id, root, path, *side, token)
                    .await
            }
            StallCategory::BackupExternallyModified { path, .. } => {
                self.resolve_backup_modified(id, root, path, token).await
            }
            StallCategory::CannotCreateFolder { path, .. }
            | StallCategory::CannotPerformDeletion { path, .. }
            | StallCategory::FilesystemErrorDuringOperation { path, .. } => {
                // Retry: clear the record; the next sync pass re-attempts
                // the operation and re-raises if it still fails
                Ok(Outcome::summary(format!("'{path}' queued for retry")))
            }
            _ => Err(StallError::ResolutionFailed(format!(
                "category {} has no executable actions",
                category.label()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // LocalAndRemoteChanged
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn resolve_both_changed(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        local: &Identity,
        remote: &Identity,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        let action = match action {
            ActionKind::KeepMostRecent => {
                if local.mtime >= remote.mtime {
                    ActionKind::KeepLocal
                } else {
                    ActionKind::KeepRemote
                }
            }
            other => other,
        };

        checkpoint(id, token)?;
        match action {
            ActionKind::KeepLocal => {
                // The losing remote copy goes to debris, then the local
                // copy uploads over it. One upload, one debris move. A
                // cancelled upload restores the remote copy.
                let entry = self
                    .debris
                    .relocate_remote(root.id(), &remote_path(root, path))
                    .await
                    .map_err(fail)?;
                let task = match self.enqueue_upload(id, root, path, local.size, token).await {
                    Ok(task) => task,
                    Err(err) => {
                        if matches!(err, StallError::Cancelled(_)) {
                            if let Err(restore) = self.debris.restore_remote(&entry).await {
                                warn!(path, error = %restore, "Could not restore remote copy after cancellation");
                            }
                        }
                        return Err(err);
                    }
                };
                let mut outcome = Outcome::summary(format!("kept local '{path}'"));
                outcome.tasks.push(task);
                outcome.debris.push(entry.id());
                if root.mode() == SyncMode::Backup {
                    outcome.root_disabled = true;
                }
                Ok(outcome)
            }
            ActionKind::KeepRemote => {
                let entry = self
                    .debris
                    .relocate_local(root.id(), root.local_root().as_path(), path)
                    .await
                    .map_err(fail)?;
                let task = match self
                    .enqueue_download(id, root, path, remote.size, token)
                    .await
                {
                    Ok(task) => task,
                    Err(err) => {
                        if matches!(err, StallError::Cancelled(_)) {
                            if let Err(restore) = self
                                .debris
                                .restore_local(&entry, root.local_root().as_path())
                                .await
                            {
                                warn!(path, error = %restore, "Could not restore local copy after cancellation");
                            }
                        }
                        return Err(err);
                    }
                };
                let mut outcome = Outcome::summary(format!("kept remote '{path}'"));
                outcome.tasks.push(task);
                outcome.debris.push(entry.id());
                Ok(outcome)
            }
            ActionKind::KeepBoth => {
                // Local file is untouched. The remote's changed copy is
                // renamed to the smallest free `name (n)` sibling, then
                // local uploads under the original name. A cancelled
                // upload renames the remote copy back.
                let target = remote_path(root, path);
                let renamed = self.free_remote_sibling(&target).await?;
                self.remote
                    .move_entry(&target, &renamed)
                    .await
                    .map_err(fail)?;
                let task = match self.enqueue_upload(id, root, path, local.size, token).await {
                    Ok(task) => task,
                    Err(err) => {
                        if matches!(err, StallError::Cancelled(_)) {
                            if let Err(undo) = self.remote.move_entry(&renamed, &target).await {
                                warn!(path, error = %undo, "Could not rename remote copy back after cancellation");
                            }
                        }
                        return Err(err);
                    }
                };
                let mut outcome = Outcome::summary(format!(
                    "kept both: remote copy renamed to '{}'",
                    renamed.name()
                ));
                outcome.tasks.push(task);
                Ok(outcome)
            }
            other => Err(StallError::ResolutionFailed(format!(
                "unexpected action {other} for changed-both-sides"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // NameConflict
    // ------------------------------------------------------------------

    async fn resolve_name_conflict(
        &self,
        id: IssueId,
        root: &SyncRoot,
        local_paths: &[String],
        remote_paths: &[String],
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        match action {
            ActionKind::RenameAll => {
                // The first path keeps its name; every later one gets a
                // numbered sibling name on its own side. Each rename is
                // complete in itself, so cancellation between them
                // leaves nothing half-done.
                let mut renamed = 0u32;
                for path in local_paths.iter().skip(if remote_paths.is_empty() {
                    1
                } else {
                    0
                }) {
                    checkpoint(id, token)?;
                    let new_rel = self.free_local_sibling(root, path).await?;
                    self.fs
                        .rename(
                            &root.local_root().join(path).into_path_buf(),
                            &root.local_root().join(&new_rel).into_path_buf(),
                        )
                        .await
                        .map_err(fail)?;
                    renamed += 1;
                }
                for path in remote_paths.iter().skip(1) {
                    checkpoint(id, token)?;
                    let target = remote_path(root, path);
                    let new_name = self.free_remote_sibling(&target).await?;
                    self.remote
                        .move_entry(&target, &new_name)
                        .await
                        .map_err(fail)?;
                    renamed += 1;
                }
                Ok(Outcome::summary(format!(
                    "renamed {renamed} colliding entries"
                )))
            }
            ActionKind::MergeFolders => {
                // Children of every later remote folder move into the
                // first, then the emptied folders go to debris.
                let Some(survivor) = remote_paths.first() else {
                    return Err(StallError::ResolutionFailed(
                        "no remote folder to merge into".to_string(),
                    ));
                };
                let survivor_path = remote_path(root, survivor);
                let mut debris_ids = Vec::new();
                for path in remote_paths.iter().skip(1) {
                    checkpoint(id, token)?;
                    let source = remote_path(root, path);
                    for child in self.remote.list(&source).await.map_err(fail)? {
                        let dest = survivor_path.join(child.path.name());
                        self.remote
                            .move_entry(&child.path, &dest)
                            .await
                            .map_err(fail)?;
                    }
                    let entry = self
                        .debris
                        .relocate_remote(root.id(), &source)
                        .await
                        .map_err(fail)?;
                    debris_ids.push(entry.id());
                }
                let mut outcome =
                    Outcome::summary(format!("merged {} folders into '{survivor}'", remote_paths.len()));
                outcome.debris = debris_ids;
                Ok(outcome)
            }
            ActionKind::RemoveDuplicates => {
                // Only identical content may be deduplicated; anything
                // else is refused rather than guessed at.
                let Some(keep) = local_paths.first().or_else(|| remote_paths.first()) else {
                    return Err(StallError::ResolutionFailed("empty clash group".to_string()));
                };
                let reference = self.read_side_content(root, keep, local_paths).await?;
                let mut debris_ids = Vec::new();
                for path in local_paths
                    .iter()
                    .chain(remote_paths.iter())
                    .filter(|p| *p != keep)
                {
                    checkpoint(id, token)?;
                    let content = self.read_side_content(root, path, local_paths).await?;
                    if content != reference {
                        return Err(StallError::ResolutionFailed(format!(
                            "'{path}' differs from '{keep}'; not a duplicate"
                        )));
                    }
                    let entry = if local_paths.contains(path) {
                        self.debris
                            .relocate_local(root.id(), root.local_root().as_path(), path)
                            .await
                            .map_err(fail)?
                    } else {
                        self.debris
                            .relocate_remote(root.id(), &remote_path(root, path))
                            .await
                            .map_err(fail)?
                    };
                    debris_ids.push(entry.id());
                }
                let mut outcome = Outcome::summary(format!(
                    "removed {} duplicates of '{keep}'",
                    debris_ids.len()
                ));
                outcome.debris = debris_ids;
                Ok(outcome)
            }
            ActionKind::KeepMostRecent => {
                let newest = self
                    .newest_in_group(root, local_paths, remote_paths)
                    .await?;
                let mut debris_ids = Vec::new();
                for path in local_paths.iter().filter(|p| **p != newest) {
                    checkpoint(id, token)?;
                    let entry = self
                        .debris
                        .relocate_local(root.id(), root.local_root().as_path(), path)
                        .await
                        .map_err(fail)?;
                    debris_ids.push(entry.id());
                }
                for path in remote_paths.iter().filter(|p| **p != newest) {
                    checkpoint(id, token)?;
                    let entry = self
                        .debris
                        .relocate_remote(root.id(), &remote_path(root, path))
                        .await
                        .map_err(fail)?;
                    debris_ids.push(entry.id());
                }
                let mut outcome = Outcome::summary(format!("kept most recent '{newest}'"));
                outcome.debris = debris_ids;
                Ok(outcome)
            }
            other => Err(StallError::ResolutionFailed(format!(
                "unexpected action {other} for name conflict"
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Remaining categories
    // ------------------------------------------------------------------

    async fn resolve_move_conflict(
        &self,
        id: IssueId,
        root: &SyncRoot,
        local_target: &str,
        remote_target: &str,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        // The loser's move is undone through the transfer queue so it
        // serializes with other work on the root.
        let op = match action {
            ActionKind::ChooseLocal => TransferOp::MoveRemote {
                from: remote_path(root, remote_target).as_str().to_string(),
                to: remote_path(root, local_target).as_str().to_string(),
            },
            ActionKind::ChooseRemote => TransferOp::MoveLocal {
                from: root.local_root().join(local_target).to_string(),
                to: root.local_root().join(remote_target).to_string(),
            },
            other => {
                return Err(StallError::ResolutionFailed(format!(
                    "unexpected action {other} for move conflict"
                )))
            }
        };
        let task = self.enqueue_and_await(id, root, op, 0, token).await?;
        let kept = if action == ActionKind::ChooseLocal {
            local_target
        } else {
            remote_target
        };
        let mut outcome = Outcome::summary(format!("move settled at '{kept}'"));
        outcome.tasks.push(task);
        Ok(outcome)
    }

    async fn resolve_kind_mismatch(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        action: ActionKind,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        checkpoint(id, token)?;
        match action {
            ActionKind::KeepLocal => {
                let entry = self
                    .debris
                    .relocate_remote(root.id(), &remote_path(root, path))
                    .await
                    .map_err(fail)?;
                let mut outcome =
                    Outcome::summary(format!("kept local '{path}'; remote copy held in debris"));
                outcome.debris.push(entry.id());
                Ok(outcome)
            }
            ActionKind::KeepRemote => {
                let entry = self
                    .debris
                    .relocate_local(root.id(), root.local_root().as_path(), path)
                    .await
                    .map_err(fail)?;
                let mut outcome =
                    Outcome::summary(format!("kept remote '{path}'; local copy held in debris"));
                outcome.debris.push(entry.id());
                Ok(outcome)
            }
            other => Err(StallError::ResolutionFailed(format!(
                "unexpected action {other} for kind mismatch"
            ))),
        }
    }

    async fn resolve_fingerprint_missing(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        side: Side,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        // Re-fetch the unverifiable side's content; the queue worker
        // writes through the atomic-replace path, so a crash mid-way
        // never corrupts the original.
        let task = match side {
            Side::Local => self.enqueue_download(id, root, path, 0, token).await?,
            Side::Remote => self.enqueue_upload(id, root, path, 0, token).await?,
        };
        let mut outcome = Outcome::summary(format!("re-fetched and verified '{path}'"));
        outcome.tasks.push(task);
        Ok(outcome)
    }

    async fn resolve_backup_modified(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Outcome, StallError> {
        // Keep-local on a backup: the externally changed remote copy is
        // preserved in debris, local re-uploads, and the root disables
        // so the external writer is surfaced to the user.
        checkpoint(id, token)?;
        let entry = self
            .debris
            .relocate_remote(root.id(), &remote_path(root, path))
            .await
            .map_err(fail)?;
        let size = self
            .fs
            .state(&root.local_root().join(path).into_path_buf())
            .await
            .map_err(fail)?
            .size;
        let task = match self.enqueue_upload(id, root, path, size, token).await {
            Ok(task) => task,
            Err(err) => {
                if matches!(err, StallError::Cancelled(_)) {
                    if let Err(restore) = self.debris.restore_remote(&entry).await {
                        warn!(path, error = %restore, "Could not restore remote copy after cancellation");
                    }
                }
                return Err(err);
            }
        };
        let mut outcome = Outcome::summary(format!(
            "restored backup copy of '{path}'; root disabled pending review"
        ));
        outcome.tasks.push(task);
        outcome.debris.push(entry.id());
        outcome.root_disabled = true;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn enqueue_upload(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        bytes: u64,
        token: &CancellationToken,
    ) -> Result<TaskId, StallError> {
        let op = TransferOp::Upload {
            local: root.local_root().join(path).to_string(),
            remote: remote_path(root, path).as_str().to_string(),
        };
        self.enqueue_and_await(id, root, op, bytes, token).await
    }

    async fn enqueue_download(
        &self,
        id: IssueId,
        root: &SyncRoot,
        path: &str,
        bytes: u64,
        token: &CancellationToken,
    ) -> Result<TaskId, StallError> {
        let op = TransferOp::Download {
            remote: remote_path(root, path).as_str().to_string(),
            local: root.local_root().join(path).to_string(),
        };
        self.enqueue_and_await(id, root, op, bytes, token).await
    }

    /// Enqueue a sync-originated task and suspend until it finishes
    ///
    /// Cancellation stops the wait, not the task; the caller is
    /// expected to undo any side effect the task was committing.
    async fn enqueue_and_await(
        &self,
        id: IssueId,
        root: &SyncRoot,
        op: TransferOp,
        bytes: u64,
        token: &CancellationToken,
    ) -> Result<TaskId, StallError> {
        let task = TransferTask::sync_originated(root.id(), op, bytes);
        let task_id = self.queue.enqueue(task).await.map_err(fail)?;
        let state = tokio::select! {
            // A transfer that already finished counts as finished even
            // if cancellation raced it
            biased;
            s = self.queue.await_completion(task_id) => s.map_err(fail)?,
            () = token.cancelled() => return Err(StallError::Cancelled(id)),
        };
        match state {
            TaskState::Completed => Ok(task_id),
            terminal => Err(StallError::ResolutionFailed(format!(
                "transfer task {task_id} ended {terminal}"
            ))),
        }
    }

    /// Smallest free `name (n)` sibling of a remote path
    async fn free_remote_sibling(&self, path: &RemotePath) -> Result<RemotePath, StallError> {
        let parent = path.parent().unwrap_or_else(RemotePath::root);
        let mut n = 1u32;
        loop {
            let candidate = parent.join(&StallNamer::numbered(path.name(), n));
            if !self.remote.exists(&candidate).await.map_err(fail)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Smallest free `name (n)` sibling of a local relative path
    async fn free_local_sibling(&self, root: &SyncRoot, rel: &str) -> Result<String, StallError> {
        let (parent, name) = match rel.rsplit_once('/') {
            Some((p, n)) => (p, n),
            None => ("", rel),
        };
        let mut n = 1u32;
        loop {
            let candidate_name = StallNamer::numbered(name, n);
            let candidate_rel = if parent.is_empty() {
                candidate_name.clone()
            } else {
                format!("{parent}/{candidate_name}")
            };
            let abs = root.local_root().join(&candidate_rel).into_path_buf();
            if !self.fs.state(&abs).await.map_err(fail)?.exists {
                return Ok(candidate_rel);
            }
            n += 1;
        }
    }

    async fn read_side_content(
        &self,
        root: &SyncRoot,
        path: &str,
        local_paths: &[String],
    ) -> Result<Vec<u8>, StallError> {
        if local_paths.iter().any(|p| p == path) {
            self.fs
                .read(&root.local_root().join(path).into_path_buf())
                .await
                .map_err(fail)
        } else {
            self.remote.read(&remote_path(root, path)).await.map_err(fail)
        }
    }

    /// The most recently modified path in a clash group
    async fn newest_in_group(
        &self,
        root: &SyncRoot,
        local_paths: &[String],
        remote_paths: &[String],
    ) -> Result<String, StallError> {
        let mut newest: Option<(String, chrono::DateTime<chrono::Utc>)> = None;
        for path in local_paths {
            let state = self
                .fs
                .state(&root.local_root().join(path).into_path_buf())
                .await
                .map_err(fail)?;
            if let Some(modified) = state.modified {
                if newest.as_ref().map_or(true, |(_, t)| modified > *t) {
                    newest = Some((path.clone(), modified));
                }
            }
        }
        for path in remote_paths {
            let target = remote_path(root, path);
            let parent = target.parent().unwrap_or_else(RemotePath::root);
            let entries = self.remote.list(&parent).await.map_err(fail)?;
            if let Some(entry) = entries.iter().find(|e| e.path == target) {
                if newest
                    .as_ref()
                    .map_or(true, |(_, t)| entry.identity.mtime > *t)
                {
                    newest = Some((path.clone(), entry.identity.mtime));
                }
            }
        }
        newest
            .map(|(p, _)| p)
            .ok_or_else(|| StallError::ResolutionFailed("no timestamps in clash group".to_string()))
    }
}

/// Absolute remote path of a root-relative `/`-separated path
fn remote_path(root: &SyncRoot, rel: &str) -> RemotePath {
    rel.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.remote_root().clone(), |p, seg| p.join(seg))
}

/// Stop at a safe point if cancellation was requested
fn checkpoint(id: IssueId, token: &CancellationToken) -> Result<(), StallError> {
    if token.is_cancelled() {
        Err(StallError::Cancelled(id))
    } else {
        Ok(())
    }
}

fn fail(err: impl std::fmt::Display) -> StallError {
    StallError::ResolutionFailed(err.to_string())
}
